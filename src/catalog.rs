use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub const DEFAULT_CATALOG_FILE: &str = "catalog.json";
pub const SIZES: [&str; 3] = ["S", "M", "L"];
pub const ADD_TO_CART_DELAY: Duration = Duration::from_millis(400);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Audio,
    Wearable,
    Mobile,
    Home,
}

impl Category {
    pub const ALL: [Category; 4] = [Self::Audio, Self::Wearable, Self::Mobile, Self::Home];

    pub fn label(self) -> &'static str {
        match self {
            Self::Audio => "Audio",
            Self::Wearable => "Wearable",
            Self::Mobile => "Mobile",
            Self::Home => "Home",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    /// Filter buttons in display order.
    pub fn options() -> Vec<CategoryFilter> {
        std::iter::once(Self::All)
            .chain(Category::ALL.into_iter().map(Self::Only))
            .collect()
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Only(category) => category.label(),
        }
    }

    pub fn matches(self, category: Category) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => wanted == category,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category: Category,
    pub price: u32,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gallery: Option<Vec<String>>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_description: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
}

impl Product {
    pub fn images(&self) -> Vec<&str> {
        match &self.gallery {
            Some(gallery) if !gallery.is_empty() => gallery.iter().map(String::as_str).collect(),
            _ => vec![self.image_url.as_str()],
        }
    }

    pub fn detail_text(&self) -> &str {
        self.long_description
            .as_deref()
            .filter(|text| !text.trim().is_empty())
            .unwrap_or(&self.description)
    }

    pub fn offers_sizes(&self) -> bool {
        self.category == Category::Wearable
    }

    pub fn price_label(&self) -> String {
        format!("${}", self.price)
    }
}

#[derive(Clone, Debug)]
pub struct Catalog {
    source_path: Option<PathBuf>,
    products: Vec<Product>,
}

impl Catalog {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Unable to read product catalog: {}", path.display()))?;
        let products: Vec<Product> = serde_json::from_str(&content)
            .with_context(|| format!("Invalid product catalog JSON: {}", path.display()))?;

        if products.is_empty() {
            bail!("Product catalog is empty: {}", path.display());
        }

        tracing::info!(path = %path.display(), products = products.len(), "catalog loaded");

        Ok(Self {
            source_path: Some(path.to_path_buf()),
            products,
        })
    }

    pub fn try_load_default() -> Option<Self> {
        let candidate = Path::new(DEFAULT_CATALOG_FILE);
        if !candidate.exists() {
            return None;
        }

        match Self::load(candidate) {
            Ok(catalog) => Some(catalog),
            Err(err) => {
                tracing::warn!(error = %err, "ignoring unreadable catalog file");
                None
            }
        }
    }

    pub fn from_products(products: Vec<Product>) -> Self {
        Self {
            source_path: None,
            products,
        }
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn filter(&self, filter: CategoryFilter) -> Vec<&Product> {
        self.products
            .iter()
            .filter(|product| filter.matches(product.category))
            .collect()
    }

    pub fn find(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|product| product.id == id)
    }

    /// Plain-text listing used to ground the concierge's system prompt.
    pub fn prompt_summary(&self) -> String {
        let mut out = String::from("Aura collection:\n");
        for product in &self.products {
            out.push_str(&format!(
                "- {} ({}, {}): {}\n",
                product.name,
                product.category,
                product.price_label(),
                product.description
            ));
        }
        out
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::from_products(builtin_products())
    }
}

#[derive(Clone, Debug, Default)]
pub struct Cart {
    items: Vec<Product>,
}

impl Cart {
    pub fn add(&mut self, product: &Product) {
        self.items.push(product.clone());
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total(&self) -> u32 {
        self.items.iter().map(|product| product.price).sum()
    }
}

/// Grid/detail navigation state.
#[derive(Clone, Debug)]
struct PendingAdd {
    product_id: String,
    started: Instant,
}

#[derive(Clone, Debug, Default)]
pub struct Storefront {
    pub filter: CategoryFilter,
    selected_product: Option<String>,
    selected_image: usize,
    selected_size: Option<&'static str>,
    pending_add: Option<PendingAdd>,
    pub cart: Cart,
}

impl Storefront {
    pub fn selected_product<'a>(&self, catalog: &'a Catalog) -> Option<&'a Product> {
        self.selected_product
            .as_deref()
            .and_then(|id| catalog.find(id))
    }

    pub fn open_product(&mut self, product: &Product) {
        self.selected_product = Some(product.id.clone());
        self.selected_image = 0;
        self.selected_size = None;
    }

    pub fn back_to_shop(&mut self) {
        self.selected_product = None;
        self.selected_image = 0;
        self.selected_size = None;
    }

    pub fn selected_image(&self) -> usize {
        self.selected_image
    }

    pub fn select_image(&mut self, product: &Product, index: usize) {
        if index < product.images().len() {
            self.selected_image = index;
        }
    }

    pub fn selected_size(&self) -> Option<&'static str> {
        self.selected_size
    }

    pub fn select_size(&mut self, size: &'static str) {
        self.selected_size = Some(size);
    }

    pub fn is_adding(&self) -> bool {
        self.pending_add.is_some()
    }

    /// Starts a delayed add; the button stays disabled until
    /// [`Self::poll_pending_add`] commits it. Returns `false` while another
    /// add is still pending.
    pub fn begin_add_to_cart(&mut self, product: &Product, now: Instant) -> bool {
        if self.pending_add.is_some() {
            return false;
        }

        self.pending_add = Some(PendingAdd {
            product_id: product.id.clone(),
            started: now,
        });
        true
    }

    // Navigation does not cancel a pending add.
    pub fn poll_pending_add(&mut self, catalog: &Catalog, now: Instant) -> bool {
        let due = match &self.pending_add {
            Some(pending) => now.saturating_duration_since(pending.started) >= ADD_TO_CART_DELAY,
            None => false,
        };
        if !due {
            return false;
        }

        let Some(pending) = self.pending_add.take() else {
            return false;
        };
        match catalog.find(&pending.product_id) {
            Some(product) => {
                self.add_to_cart(product);
                true
            }
            None => {
                tracing::warn!(product = %pending.product_id, "pending cart item left the catalog");
                false
            }
        }
    }

    fn add_to_cart(&mut self, product: &Product) {
        self.cart.add(product);
        tracing::info!(product = %product.id, items = self.cart.len(), "added to cart");
    }
}

fn product(
    id: &str,
    name: &str,
    category: Category,
    price: u32,
    description: &str,
    features: &[&str],
) -> Product {
    Product {
        id: id.to_string(),
        name: name.to_string(),
        category,
        price,
        image_url: format!("https://images.aura.example/{id}/cover.jpg"),
        gallery: None,
        description: description.to_string(),
        long_description: None,
        features: features.iter().map(|f| f.to_string()).collect(),
    }
}

pub fn builtin_products() -> Vec<Product> {
    let mut earth = product(
        "p1",
        "Aura Earth",
        Category::Audio,
        299,
        "Over-ear headphones in sandstone and walnut.",
        &["Adaptive noise cancellation", "40-hour battery", "Memory foam cushions"],
    );
    earth.gallery = Some(vec![
        "https://images.aura.example/p1/cover.jpg".to_string(),
        "https://images.aura.example/p1/side.jpg".to_string(),
        "https://images.aura.example/p1/case.jpg".to_string(),
    ]);
    earth.long_description = Some(
        "Shaped from warm walnut and soft sandstone fabric, Aura Earth brings quiet to busy rooms without closing you off from them."
            .to_string(),
    );

    let mut loop_band = product(
        "p2",
        "Aura Loop",
        Category::Wearable,
        199,
        "A woven wellness band that tracks rest and rhythm.",
        &["Sleep and recovery insights", "Seven-day battery", "Recycled linen weave"],
    );
    loop_band.long_description = Some(
        "Aura Loop reads your day gently and tells you only what matters: how you rested and when to slow down."
            .to_string(),
    );

    vec![
        earth,
        loop_band,
        product(
            "p3",
            "Aura Stone",
            Category::Mobile,
            89,
            "A ceramic wireless charger with a matte finish.",
            &["15W fast charging", "Hand-glazed ceramic", "Soft status light"],
        ),
        product(
            "p4",
            "Aura Hearth",
            Category::Home,
            349,
            "A room speaker wrapped in wool felt.",
            &["360-degree sound", "Voice assistant ready", "Multi-room pairing"],
        ),
        product(
            "p5",
            "Aura Pebble",
            Category::Audio,
            179,
            "True wireless earbuds in a smooth stone case.",
            &["Spatial audio", "Wireless charging case", "IPX4 water resistance"],
        ),
        product(
            "p6",
            "Aura Lumen",
            Category::Home,
            129,
            "A sunrise lamp that wakes you with warm light.",
            &["Gradual sunrise alarm", "Warm dimming", "Linen shade"],
        ),
    ]
}
