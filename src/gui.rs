use crate::assistant::AssistantWidget;
use crate::catalog::{Catalog, CategoryFilter, Product, Storefront, SIZES};
use crate::chat_api::{ChatClient, ChatConfig};
use crate::conversation::{ReplyGateway, SendOutcome};
use crate::message_store::{ChatMessage, Role};
use anyhow::{anyhow, Result};
use eframe::egui::{self, Align, Button, Color32, Frame, Layout, RichText, ScrollArea, Stroke};
use std::sync::Arc;
use std::time::{Duration, Instant};

const SAND: Color32 = Color32::from_rgb(245, 242, 235);
const LINEN: Color32 = Color32::from_rgb(235, 231, 222);
const STONE: Color32 = Color32::from_rgb(214, 209, 199);
const INK: Color32 = Color32::from_rgb(44, 42, 38);
const MUTED: Color32 = Color32::from_rgb(93, 90, 83);
const FAINT: Color32 = Color32::from_rgb(168, 162, 158);
const PAPER: Color32 = Color32::from_rgb(255, 255, 255);

const PANEL_WIDTH: f32 = 380.0;
const PANEL_HEIGHT: f32 = 560.0;
const GRID_COLUMNS: usize = 3;

pub fn run_gui(config: ChatConfig, catalog: Catalog) -> Result<()> {
    let client = ChatClient::new(config)?;
    let assistant = AssistantWidget::new(Arc::new(client));

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1180.0, 820.0])
            .with_min_inner_size([720.0, 560.0])
            .with_title("Aura"),
        ..Default::default()
    };

    eframe::run_native(
        "Aura",
        native_options,
        Box::new(move |cc| {
            configure_theme(&cc.egui_ctx);
            Ok(Box::new(StorefrontApp::new(catalog, assistant)))
        }),
    )
    .map_err(|err| anyhow!("Unable to start the storefront window: {err}"))
}

fn configure_theme(ctx: &egui::Context) {
    let mut style = (*ctx.style()).clone();
    style.visuals = egui::Visuals::light();
    style.visuals.override_text_color = Some(INK);
    style.visuals.panel_fill = SAND;
    style.visuals.window_fill = SAND;
    style.visuals.extreme_bg_color = PAPER;
    style.visuals.faint_bg_color = LINEN;
    style.visuals.widgets.inactive.bg_fill = LINEN;
    style.visuals.widgets.inactive.weak_bg_fill = LINEN;
    style.visuals.widgets.inactive.bg_stroke = Stroke::new(1.0, STONE);
    style.visuals.widgets.hovered.bg_fill = STONE;
    style.visuals.widgets.hovered.weak_bg_fill = STONE;
    style.visuals.widgets.hovered.bg_stroke = Stroke::new(1.0, INK);
    style.visuals.widgets.active.bg_fill = INK;
    style.visuals.widgets.active.weak_bg_fill = INK;
    style.visuals.selection.bg_fill = INK;
    style.visuals.selection.stroke = Stroke::new(1.0, SAND);
    style.spacing.item_spacing = egui::vec2(10.0, 10.0);
    style.spacing.button_padding = egui::vec2(14.0, 6.0);
    style
        .text_styles
        .insert(egui::TextStyle::Heading, egui::FontId::proportional(30.0));
    style
        .text_styles
        .insert(egui::TextStyle::Body, egui::FontId::proportional(15.0));
    style
        .text_styles
        .insert(egui::TextStyle::Button, egui::FontId::proportional(13.0));
    style
        .text_styles
        .insert(egui::TextStyle::Small, egui::FontId::proportional(11.0));
    ctx.set_style(style);
}

fn card<R>(
    ui: &mut egui::Ui,
    fill: Color32,
    margin: i8,
    add_contents: impl FnOnce(&mut egui::Ui) -> R,
) -> egui::InnerResponse<R> {
    Frame::default()
        .fill(fill)
        .stroke(Stroke::new(1.0, STONE))
        .corner_radius(egui::CornerRadius::same(12))
        .inner_margin(egui::Margin::same(margin))
        .show(ui, add_contents)
}

fn eyebrow(text: &str) -> RichText {
    RichText::new(text.to_uppercase()).small().color(FAINT)
}

pub struct StorefrontApp<G> {
    catalog: Catalog,
    storefront: Storefront,
    assistant: AssistantWidget<G>,
    focus_input: bool,
}

impl<G: ReplyGateway> StorefrontApp<G> {
    pub fn new(catalog: Catalog, assistant: AssistantWidget<G>) -> Self {
        Self {
            catalog,
            storefront: Storefront::default(),
            assistant,
            focus_input: false,
        }
    }

    fn render_hero(ui: &mut egui::Ui) -> egui::Response {
        Frame::default()
            .fill(STONE)
            .corner_radius(egui::CornerRadius::same(16))
            .inner_margin(egui::Margin::symmetric(32, 72))
            .show(ui, |ui| {
                ui.set_width(ui.available_width());
                ui.vertical_centered(|ui| {
                    ui.label(eyebrow("The Essentials Collection"));
                    ui.add_space(12.0);
                    ui.label(RichText::new("Sanctuary within.").size(56.0).color(SAND));
                    ui.add_space(12.0);
                    ui.label(
                        RichText::new(
                            "Elevate your daily rituals with objects of calm and utility.\n\
                             Designed for the modern, mindful home.",
                        )
                        .size(18.0)
                        .color(PAPER),
                    );
                    ui.add_space(24.0);
                    ui.add(
                        Button::new(RichText::new("EXPLORE THE HOME").color(INK))
                            .fill(SAND)
                            .corner_radius(egui::CornerRadius::same(24))
                            .min_size(egui::vec2(220.0, 44.0)),
                    )
                })
                .inner
            })
            .inner
    }

    fn render_grid(ui: &mut egui::Ui, catalog: &Catalog, storefront: &mut Storefront) {
        let explore = Self::render_hero(ui).clicked();
        ui.add_space(32.0);

        ui.vertical_centered(|ui| {
            let heading = ui.heading("Curated Objects");
            if explore {
                heading.scroll_to_me(Some(Align::TOP));
            }
            ui.add_space(8.0);
            ui.horizontal_wrapped(|ui| {
                for option in CategoryFilter::options() {
                    if ui
                        .selectable_label(storefront.filter == option, option.label())
                        .clicked()
                    {
                        storefront.filter = option;
                    }
                }
            });
        });
        ui.add_space(16.0);

        let products = catalog.filter(storefront.filter);
        let mut opened: Option<&Product> = None;

        egui::Grid::new("product_grid")
            .num_columns(GRID_COLUMNS)
            .spacing([24.0, 24.0])
            .show(ui, |ui| {
                for (index, product) in products.iter().copied().enumerate() {
                    if Self::render_product_card(ui, product) {
                        opened = Some(product);
                    }
                    if (index + 1) % GRID_COLUMNS == 0 {
                        ui.end_row();
                    }
                }
            });

        if let Some(product) = opened {
            storefront.open_product(product);
        }
    }

    fn render_product_card(ui: &mut egui::Ui, product: &Product) -> bool {
        card(ui, PAPER, 14, |ui| {
            ui.set_width(260.0);
            ui.vertical_centered(|ui| {
                Frame::default()
                    .fill(LINEN)
                    .corner_radius(egui::CornerRadius::same(8))
                    .inner_margin(egui::Margin::symmetric(12, 48))
                    .show(ui, |ui| {
                        ui.set_width(232.0);
                        ui.label(RichText::new(product.name.as_str()).italics().color(MUTED));
                    });
                ui.label(RichText::new(product.name.as_str()).size(20.0));
                ui.label(eyebrow(product.category.label()));
                ui.label(RichText::new(product.price_label()).strong());
                ui.add(Button::new("View Object").min_size(egui::vec2(140.0, 28.0)))
                    .clicked()
            })
            .inner
        })
        .inner
    }

    fn render_detail(ui: &mut egui::Ui, storefront: &mut Storefront, product: &Product) {
        if ui.button("< Back to Shop").clicked() {
            storefront.back_to_shop();
            return;
        }
        ui.add_space(8.0);

        let images = product.images();
        let selected_image = storefront.selected_image();

        ui.horizontal_top(|ui| {
            ui.vertical(|ui| {
                ui.set_width(420.0);
                card(ui, LINEN, 24, |ui| {
                    ui.set_min_height(360.0);
                    ui.label(RichText::new(product.name.as_str()).italics().color(MUTED));
                    if let Some(url) = images.get(selected_image) {
                        ui.hyperlink_to("Open image", *url);
                    }
                });
                if images.len() > 1 {
                    ui.horizontal(|ui| {
                        for index in 0..images.len() {
                            let label = format!("{}", index + 1);
                            if ui.selectable_label(index == selected_image, label).clicked() {
                                storefront.select_image(product, index);
                            }
                        }
                    });
                }
            });

            ui.add_space(32.0);

            ui.vertical(|ui| {
                ui.set_max_width(460.0);
                ui.label(eyebrow(product.category.label()));
                ui.heading(product.name.as_str());
                ui.label(RichText::new(product.price_label()).size(22.0));
                ui.add_space(8.0);
                ui.add(egui::Label::new(RichText::new(product.detail_text()).color(MUTED)).wrap());
                ui.separator();

                if product.offers_sizes() {
                    ui.label(RichText::new("SELECT SIZE").small().strong());
                    ui.horizontal(|ui| {
                        for size in SIZES {
                            let selected = storefront.selected_size() == Some(size);
                            if ui.selectable_label(selected, size).clicked() {
                                storefront.select_size(size);
                            }
                        }
                    });
                    ui.add_space(8.0);
                }

                let adding = storefront.is_adding();
                let label = if adding {
                    "Adding...".to_string()
                } else {
                    format!("Add to Cart - {}", product.price_label())
                };
                let add = Button::new(RichText::new(label).color(SAND))
                    .fill(if adding { MUTED } else { INK })
                    .min_size(egui::vec2(ui.available_width(), 40.0));
                if ui.add_enabled(!adding, add).clicked() {
                    storefront.begin_add_to_cart(product, Instant::now());
                }

                ui.add_space(12.0);
                for feature in &product.features {
                    ui.label(format!("- {feature}"));
                }
            });
        });
    }

    pub(crate) fn render_message(ui: &mut egui::Ui, message: &ChatMessage) -> egui::Rect {
        let is_user = message.role() == Role::User;
        let (fill, text_color) = if is_user { (INK, SAND) } else { (PAPER, MUTED) };
        let max_bubble_width = (ui.available_width() * 0.85).clamp(160.0, PANEL_WIDTH);
        let row_layout = if is_user {
            Layout::right_to_left(Align::TOP)
        } else {
            Layout::left_to_right(Align::TOP)
        };
        let stamp = message
            .timestamp()
            .with_timezone(&chrono::Local)
            .format("%H:%M")
            .to_string();

        let mut bubble_rect = egui::Rect::NOTHING;
        ui.horizontal(|ui| {
            ui.set_width(ui.available_width());
            ui.with_layout(row_layout, |ui| {
                bubble_rect = ui
                    .scope(|ui| {
                        ui.set_max_width(max_bubble_width);
                        Frame::default()
                            .fill(fill)
                            .stroke(Stroke::new(1.0, LINEN))
                            .corner_radius(egui::CornerRadius::same(14))
                            .inner_margin(egui::Margin::same(12))
                            .show(ui, |ui| {
                                ui.vertical(|ui| {
                                    ui.add(
                                        egui::Label::new(
                                            RichText::new(message.text()).color(text_color),
                                        )
                                        .wrap(),
                                    );
                                    ui.label(RichText::new(stamp).small().color(FAINT));
                                });
                            })
                            .response
                            .rect
                    })
                    .inner;
            });
        });

        bubble_rect
    }

    fn render_thinking(ui: &mut egui::Ui) {
        ui.with_layout(Layout::left_to_right(Align::TOP), |ui| {
            Frame::default()
                .fill(PAPER)
                .stroke(Stroke::new(1.0, LINEN))
                .corner_radius(egui::CornerRadius::same(14))
                .inner_margin(egui::Margin::symmetric(14, 8))
                .show(ui, |ui| {
                    ui.label(RichText::new("...").strong().color(FAINT));
                });
        });
    }

    fn render_assistant(&mut self, ctx: &egui::Context) {
        egui::Area::new(egui::Id::new("concierge"))
            .anchor(egui::Align2::RIGHT_BOTTOM, egui::vec2(-24.0, -24.0))
            .show(ctx, |ui| {
                ui.with_layout(Layout::top_down(Align::RIGHT), |ui| {
                    if self.assistant.is_open() {
                        self.render_panel(ui);
                        ui.add_space(12.0);
                    }

                    let launcher = if self.assistant.is_open() { "v" } else { "Ai" };
                    let button = Button::new(RichText::new(launcher).size(20.0).italics().color(SAND))
                        .fill(INK)
                        .corner_radius(egui::CornerRadius::same(28))
                        .min_size(egui::vec2(56.0, 56.0));
                    if ui.add(button).clicked() {
                        self.assistant.toggle();
                        self.focus_input = self.assistant.is_open();
                    }
                });
            });
    }

    fn render_panel(&mut self, ui: &mut egui::Ui) {
        card(ui, SAND, 0, |ui| {
            ui.set_width(PANEL_WIDTH);
            ui.set_height(PANEL_HEIGHT);

            Frame::default()
                .fill(LINEN)
                .inner_margin(egui::Margin::symmetric(16, 12))
                .show(ui, |ui| {
                    ui.set_width(ui.available_width());
                    ui.horizontal(|ui| {
                        ui.vertical(|ui| {
                            ui.label(RichText::new("Aura").italics().size(18.0));
                            ui.label(eyebrow("Concierge"));
                        });
                        ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                            if ui.add(Button::new("x").frame(false)).clicked() {
                                self.assistant.close();
                            }
                        });
                    });
                });

            let input_height = 64.0;
            let messages_height = (ui.available_height() - input_height).max(120.0);
            ScrollArea::vertical()
                .id_salt("concierge_messages")
                .auto_shrink([false, false])
                .max_height(messages_height)
                .show(ui, |ui| {
                    ui.add_space(12.0);
                    let mut last_rect = egui::Rect::NOTHING;
                    for message in self.assistant.messages() {
                        last_rect = Self::render_message(ui, message);
                        ui.add_space(8.0);
                    }
                    if self.assistant.is_awaiting_reply() {
                        Self::render_thinking(ui);
                        last_rect = last_rect.union(ui.min_rect());
                    }
                    // Only a pass that will be painted may consume the request,
                    // and only after this pass has laid out the messages.
                    let final_pass = !ui.is_sizing_pass() && !ui.ctx().will_discard();
                    if final_pass && self.assistant.take_scroll_request() {
                        ui.scroll_to_rect(last_rect, Some(Align::BOTTOM));
                    }
                });

            Frame::default()
                .fill(PAPER)
                .inner_margin(egui::Margin::same(12))
                .show(ui, |ui| {
                    ui.set_width(ui.available_width());
                    ui.horizontal(|ui| {
                        let send_width = 36.0;
                        let input_width = (ui.available_width() - send_width - 12.0).max(120.0);
                        let input_enabled = self.assistant.input_enabled();
                        let response = ui
                            .add_enabled_ui(input_enabled, |ui| {
                                ui.add_sized(
                                    [input_width, 28.0],
                                    egui::TextEdit::singleline(self.assistant.draft_input_mut())
                                        .hint_text("Ask anything..."),
                                )
                            })
                            .inner;

                        if self.focus_input && input_enabled {
                            response.request_focus();
                            self.focus_input = false;
                        }

                        let enter_pressed =
                            response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

                        let send = Button::new(RichText::new("->").color(SAND))
                            .fill(INK)
                            .corner_radius(egui::CornerRadius::same(18))
                            .min_size(egui::vec2(send_width, 28.0));
                        let clicked = ui.add_enabled(self.assistant.can_submit(), send).clicked();
                        if (clicked || enter_pressed)
                            && self.assistant.submit_draft() == SendOutcome::Dispatched
                        {
                            self.focus_input = true;
                        }
                    });
                });
        });
    }
}

impl<G: ReplyGateway> eframe::App for StorefrontApp<G> {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.assistant.pump();
        self.storefront.poll_pending_add(&self.catalog, Instant::now());

        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.assistant.close();
        }

        egui::TopBottomPanel::top("storefront_header")
            .frame(
                Frame::default()
                    .fill(SAND)
                    .inner_margin(egui::Margin::symmetric(24, 14)),
            )
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(RichText::new("Aura").italics().size(26.0));
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        let cart = &self.storefront.cart;
                        ui.label(format!("Cart ({}) {}", cart.len(), format_total(cart.total())));
                    });
                });
            });

        egui::CentralPanel::default()
            .frame(
                Frame::default()
                    .fill(SAND)
                    .inner_margin(egui::Margin::same(24)),
            )
            .show(ctx, |ui| {
                ScrollArea::vertical()
                    .id_salt("storefront_scroll")
                    .auto_shrink([false, false])
                    .show(ui, |ui| {
                        let catalog = &self.catalog;
                        match self.storefront.selected_product(catalog) {
                            Some(product) => {
                                Self::render_detail(ui, &mut self.storefront, product)
                            }
                            None => Self::render_grid(ui, catalog, &mut self.storefront),
                        }
                    });
            });

        self.render_assistant(ctx);

        if self.assistant.is_awaiting_reply() || self.storefront.is_adding() {
            ctx.request_repaint_after(Duration::from_millis(50));
        }
    }
}

fn format_total(total: u32) -> String {
    format!("${total}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::tests::StubGateway;
    use crate::message_store::ChatMessage;

    fn render_rect_for_message(message: ChatMessage, available_width: f32) -> egui::Rect {
        let ctx = egui::Context::default();
        let mut rendered_rect = None;

        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            egui::CentralPanel::default().show(ctx, |ui| {
                ui.allocate_ui_with_layout(
                    egui::vec2(available_width, 400.0),
                    Layout::top_down(Align::LEFT),
                    |ui| {
                        rendered_rect =
                            Some(StorefrontApp::<StubGateway>::render_message(ui, &message));
                    },
                );
            });
        });

        rendered_rect.expect("message should be rendered")
    }

    #[test]
    fn render_message_long_text_stays_within_bubble_width() {
        let message = ChatMessage::assistant("a very long answer about walnut ".repeat(60));
        let available_width = 340.0;
        let expected_max_width = (available_width * 0.85f32).clamp(160.0, PANEL_WIDTH);

        let rect = render_rect_for_message(message, available_width);

        assert!(
            rect.width() <= expected_max_width + 1.0,
            "bubble width {} exceeded max {}",
            rect.width(),
            expected_max_width
        );
    }

    #[test]
    fn render_message_user_bubble_stays_within_bubble_width() {
        let message = ChatMessage::user("what goes well with the Aura Hearth speaker ".repeat(30));
        let available_width = 360.0;
        let expected_max_width = (available_width * 0.85f32).clamp(160.0, PANEL_WIDTH);

        let rect = render_rect_for_message(message, available_width);

        assert!(
            rect.width() <= expected_max_width + 1.0,
            "bubble width {} exceeded max {}",
            rect.width(),
            expected_max_width
        );
    }

    #[test]
    fn short_message_bubble_stacks_time_under_text() {
        let rect = render_rect_for_message(ChatMessage::assistant("Hi"), 340.0);

        // Two stacked lines of text plus the 12px margins.
        assert!(rect.height() > 24.0 + 2.0 * 15.0, "bubble height {}", rect.height());
        assert!(rect.width() < 160.0, "bubble width {}", rect.width());
    }

    #[test]
    fn storefront_page_opens_with_hero_above_the_grid() {
        let ctx = egui::Context::default();
        let catalog = Catalog::default();
        let mut storefront = Storefront::default();
        let mut hero_button = None;
        let mut page_rect = None;

        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            egui::CentralPanel::default().show(ctx, |ui| {
                hero_button = Some(StorefrontApp::<StubGateway>::render_hero(ui));
            });
        });
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            egui::CentralPanel::default().show(ctx, |ui| {
                let page = ui.scope(|ui| {
                    StorefrontApp::<StubGateway>::render_grid(ui, &catalog, &mut storefront)
                });
                page_rect = Some(page.response.rect);
            });
        });

        let hero_button = hero_button.unwrap();
        assert!(hero_button.enabled());
        assert!(!hero_button.clicked());
        assert!(page_rect.unwrap().height() > hero_button.rect.bottom());
        assert!(storefront.selected_product(&catalog).is_none());
    }

    #[test]
    fn open_panel_frame_consumes_scroll_request() {
        let mut app = StorefrontApp::new(
            Catalog::default(),
            AssistantWidget::new(StubGateway::replying(&[])),
        );
        app.assistant.toggle();
        assert!(app.assistant.scroll_pending());

        let ctx = egui::Context::default();
        for _ in 0..2 {
            let _ = ctx.run(egui::RawInput::default(), |ctx| {
                app.render_assistant(ctx);
            });
        }

        assert!(!app.assistant.scroll_pending());
    }

    #[test]
    fn closed_panel_keeps_scroll_request_for_next_open() {
        let mut app = StorefrontApp::new(
            Catalog::default(),
            AssistantWidget::new(StubGateway::replying(&[])),
        );
        app.assistant.toggle();
        app.assistant.close();

        let ctx = egui::Context::default();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            app.render_assistant(ctx);
        });

        assert!(app.assistant.scroll_pending());
    }

    #[test]
    fn format_total_prefixes_currency() {
        assert_eq!(format_total(218), "$218");
    }
}
