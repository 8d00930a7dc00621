use crate::chat::{ChatSession, Phase, Submission};
use crate::completion::CompletionClient;
use crate::event::AppEvent;
use crate::theme::Theme;
use eframe::egui::{self, Key, Modifiers, RichText, ScrollArea};
use log::{info, warn};
use std::sync::mpsc::{Receiver, TryRecvError};

const NO_ATTACHMENT_LABEL: &str = "No file attached";

pub struct ChatApp {
    rx: Receiver<AppEvent>,
    client: CompletionClient,
    session: ChatSession,
    input_buffer: String,
    theme: Theme,
    scroll_to_bottom: bool,
    visuals_applied: bool,
}

impl ChatApp {
    pub fn new(rx: Receiver<AppEvent>, client: CompletionClient, session: ChatSession) -> Self {
        Self {
            rx,
            client,
            session,
            input_buffer: String::new(),
            theme: Theme::default(),
            scroll_to_bottom: false,
            visuals_applied: false,
        }
    }

    fn submit_prompt(&mut self, ctx: &egui::Context) {
        match self.session.submit(&self.input_buffer) {
            Submission::Ignored => return,
            Submission::Rejected => {}
            Submission::Dispatched(history) => {
                self.client.send(history);
                self.input_buffer.clear();
            }
        }
        self.scroll_to_bottom = true;
        ctx.request_repaint();
    }

    fn pick_attachment(&mut self) {
        match rfd::FileDialog::new().pick_file() {
            Some(path) => self.session.attach(path),
            None => info!("attach dialog dismissed"),
        }
    }

    fn drain_events(&mut self, ctx: &egui::Context) {
        loop {
            match self.rx.try_recv() {
                Ok(event) => self.apply_event(event, ctx),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!("event channel disconnected");
                    break;
                }
            }
        }
    }

    fn apply_event(&mut self, event: AppEvent, ctx: &egui::Context) {
        match event {
            AppEvent::CompletionFinished(outcome) => {
                self.session.finish(outcome);
                info!(
                    "turn finished; history holds {} messages",
                    self.session.conversation().len()
                );
                self.scroll_to_bottom = true;
                ctx.request_repaint();
            }
        }
    }

    fn render_transcript(&mut self, ui: &mut egui::Ui, height: f32) {
        self.theme.transcript_frame().show(ui, |ui| {
            ScrollArea::vertical()
                .id_salt("chat_transcript")
                .max_height(height)
                .auto_shrink([false, false])
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    for entry in self.session.transcript() {
                        ui.label(
                            RichText::new(format!("{}:", entry.sender.label()))
                                .strong()
                                .color(self.theme.sender_color(entry.sender)),
                        );
                        ui.label(&entry.body);
                        ui.add_space(self.theme.spacing_8);
                    }

                    if self.session.is_requesting() {
                        ui.horizontal(|ui| {
                            ui.spinner();
                            let waiting = RichText::new("Waiting for response...")
                                .color(self.theme.text_muted);
                            ui.label(waiting);
                        });
                    }

                    if self.scroll_to_bottom {
                        ui.scroll_to_cursor(Some(egui::Align::BOTTOM));
                    }
                });
        });
        self.scroll_to_bottom = false;
    }

    fn render_attachment_row(&mut self, ui: &mut egui::Ui) {
        let mut attach_clicked = false;
        let mut remove_clicked = false;

        ui.horizontal(|ui| {
            let (label, attached) = match self.session.attachment() {
                Some(attachment) => (attachment.display_name.as_str(), true),
                None => (NO_ATTACHMENT_LABEL, false),
            };
            let color = self.theme.attachment_color(attached);
            ui.label(RichText::new(label).color(color));

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                attach_clicked = ui.button("Attach File").clicked();
                remove_clicked = ui
                    .add_enabled(attached, egui::Button::new("Remove"))
                    .clicked();
            });
        });

        if attach_clicked {
            self.pick_attachment();
        }
        if remove_clicked {
            self.session.remove_attachment();
        }
    }

    fn render_composer(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let composer_id = egui::Id::new("composer_input");
        let input_enabled = self.session.phase() == Phase::Idle;
        let hint = if input_enabled {
            "Type a message..."
        } else {
            "Waiting for response..."
        };

        // Plain Enter submits; Shift+Enter falls through to the text edit as a newline.
        let has_focus = ui.memory(|memory| memory.has_focus(composer_id));
        let enter_pressed = has_focus
            && ui.input_mut(|input| {
                !input.modifiers.shift && input.consume_key(Modifiers::NONE, Key::Enter)
            });

        let mut send_now = enter_pressed;
        self.theme.composer_frame().show(ui, |ui| {
            ui.horizontal(|ui| {
                let send_width = 72.0;
                ui.add_enabled(
                    input_enabled,
                    egui::TextEdit::multiline(&mut self.input_buffer)
                        .id(composer_id)
                        .desired_rows(self.theme.composer_rows)
                        .desired_width(ui.available_width() - send_width)
                        .hint_text(hint),
                );

                let clicked = ui
                    .add_enabled(
                        input_enabled && !self.input_buffer.trim().is_empty(),
                        egui::Button::new("Send").min_size(egui::vec2(send_width - 12.0, 56.0)),
                    )
                    .clicked();
                send_now |= clicked;
            });
        });

        if send_now && input_enabled {
            self.submit_prompt(ctx);
        }
    }
}

impl eframe::App for ChatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if !self.visuals_applied {
            self.theme.apply_visuals(ctx);
            self.visuals_applied = true;
        }

        self.drain_events(ctx);
        if self.session.is_requesting() {
            // Keeps polling the event channel while the window is otherwise idle.
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            let transcript_height = (ui.available_height() - 150.0).max(120.0);
            self.render_transcript(ui, transcript_height);
            ui.add_space(self.theme.spacing_8);
            self.render_attachment_row(ui);
            ui.add_space(self.theme.spacing_8);
            self.render_composer(ui, ctx);
        });
    }
}
