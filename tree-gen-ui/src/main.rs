use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use eframe::{egui, Frame};
use egui::{Color32, Context, RichText};

use tree_gen_core::model::candidate::Candidate;
use tree_gen_core::predictor::http::ExplorationClient;
use tree_gen_core::{
    CandidateRequest, NodeId, Predictor, PredictionTree, PredictorConfig, PredictorError,
    RelationshipReport, RelationshipScorer, RequestTicket, Resolution, SessionConfig, SessionState, TreeError,
    TreeGrowthController,
};

const CHOSEN: Color32 = Color32::from_rgb(102, 126, 234);
const OPTION: Color32 = Color32::from_rgb(153, 153, 153);

/// Answer coming back from a worker thread.
type Answer = (RequestTicket, Result<Vec<Candidate>, PredictorError>);

/// Global UI state (MUST persist between frames in egui).
struct SentenceTreeUI {
    controller: TreeGrowthController,
    predictor: Arc<ExplorationClient>,
    answers_tx: Sender<Answer>,
    answers_rx: Receiver<Answer>,

    start_word: String,
    notice: Option<String>,
    report: Option<RelationshipReport>,
}

impl SentenceTreeUI {
    /// Initializes the UI with the exploration predictor.
    fn new() -> Result<Self, PredictorError> {
        let config = PredictorConfig::exploration().with_env_overrides("TREE_GEN_EXPLORE");
        let controller = TreeGrowthController::new(SessionConfig { target_count: config.top_k });
        let (answers_tx, answers_rx) = mpsc::channel();

        Ok(Self {
            controller,
            predictor: Arc::new(ExplorationClient::new(config)?),
            answers_tx,
            answers_rx,
            start_word: String::new(),
            notice: None,
            report: None,
        })
    }

    /// Runs the request on a worker thread; the answer is picked up in `update`.
    fn spawn_request(&self, ctx: &Context, request: CandidateRequest) {
        let predictor = Arc::clone(&self.predictor);
        let tx = self.answers_tx.clone();
        let ctx = ctx.clone();

        thread::spawn(move || {
            let outcome = predictor.predict(&request.phrase, request.target_count);
            // The UI may be gone already
            let _ = tx.send((request.ticket, outcome));
            ctx.request_repaint();
        });
    }

    /// Applies every answer received since the last frame.
    fn poll_answers(&mut self) {
        while let Ok((ticket, outcome)) = self.answers_rx.try_recv() {
            match self.controller.resolve(ticket, outcome) {
                Resolution::Grown { degraded: Some(e), .. } => {
                    self.notice = Some(format!("Predictor unavailable, default words shown ({e})"));
                }
                Resolution::Finished => self.notice = Some("No more words to suggest".to_owned()),
                _ => {}
            }
        }
    }

    fn start(&mut self, ctx: &Context) {
        match self.controller.start(&self.start_word) {
            Ok(request) => {
                self.notice = None;
                self.report = None;
                self.spawn_request(ctx, request);
            }
            Err(TreeError::Validation) => self.notice = Some("Type a first word!".to_owned()),
            Err(e) => self.notice = Some(e.to_string()),
        }
    }

    fn choose(&mut self, ctx: &Context, index: usize) {
        let selected = self
            .controller
            .frontier()
            .get(index)
            .map(|node| Candidate::new(node.word(), node.probability().unwrap_or_default()));
        let context = self.controller.sentence().join(" ");

        match self.controller.choose(index) {
            Ok(request) => {
                self.report = selected.map(|candidate| RelationshipScorer::report(&candidate, &context));
                if let Some(request) = request {
                    self.spawn_request(ctx, request);
                }
            }
            Err(e) => self.notice = Some(e.to_string()),
        }
    }

    fn restart(&mut self) {
        if self.controller.restart().is_ok() {
            self.start_word.clear();
            self.notice = None;
            self.report = None;
        }
    }

    fn controls(&mut self, ctx: &Context, ui: &mut egui::Ui) {
        let state = self.controller.state();

        if matches!(state, SessionState::Idle | SessionState::AwaitingStart) {
            ui.label("Start with a first word:");
            let response = ui.text_edit_singleline(&mut self.start_word);
            let entered = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if ui.button("Start").clicked() || entered {
                self.start(ctx);
            }
        } else {
            ui.label("Your sentence:");
            ui.label(RichText::new(self.controller.sentence().join(" ")).strong().size(18.0));
        }

        if let Some(notice) = &self.notice {
            ui.colored_label(Color32::from_rgb(231, 76, 60), notice.as_str());
        }
        ui.separator();

        match state {
            SessionState::RequestingCandidates => {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Thinking...");
                });
            }
            SessionState::AwaitingChoice => {
                let options: Vec<(String, f32)> = self
                    .controller
                    .frontier()
                    .iter()
                    .map(|node| (node.word().to_owned(), node.probability().unwrap_or_default()))
                    .collect();

                let mut picked = None;
                for (index, (word, probability)) in options.iter().enumerate() {
                    let label = format!("{word}   {:.1}%", probability * 100.0);
                    if ui.add_sized([200.0, 32.0], egui::Button::new(label)).clicked() {
                        picked = Some(index);
                    }
                }
                if let Some(index) = picked {
                    self.choose(ctx, index);
                }
            }
            SessionState::Finished => {
                let sentence = self.controller.sentence();
                ui.heading("Sentence finished!");
                ui.label(sentence.join(" "));
                ui.label(format!("Words: {}", sentence.len()));
                if ui.button("Play again").clicked() {
                    self.restart();
                }
            }
            SessionState::Idle | SessionState::AwaitingStart => {}
        }

        if !matches!(state, SessionState::Idle | SessionState::AwaitingStart | SessionState::Finished)
            && ui.button("End the sentence").clicked()
        {
            let _ = self.controller.stop();
        }

        if let Some(report) = &self.report {
            ui.separator();
            ui.label(format!("\"{}\" ({}% confidence)", report.word, report.confidence));
            for relationship in &report.relationships {
                ui.horizontal(|ui| {
                    ui.label(relationship.word.as_str());
                    ui.add(
                        egui::ProgressBar::new(relationship.relationship as f32 / 100.0)
                            .desired_width(120.0)
                            .text(format!("{}% {}", relationship.relationship, relationship.label.as_str())),
                    );
                });
            }
        }
    }
}

/// Draws `id` and its descendants, chosen path highlighted.
fn draw_node(ui: &mut egui::Ui, tree: &PredictionTree, id: NodeId) {
    let node = tree.node(id);
    let label = match node.probability() {
        Some(probability) => format!("{}  {:.0}%", node.word(), probability * 100.0),
        None => node.word().to_owned(),
    };
    let text = RichText::new(label);
    ui.label(if node.is_chosen() { text.strong().color(CHOSEN) } else { text.color(OPTION) });

    if !node.children().is_empty() {
        ui.indent(id.index(), |ui| {
            for child in node.children() {
                draw_node(ui, tree, *child);
            }
        });
    }
}

impl eframe::App for SentenceTreeUI {
    /// UI update loop (called every frame).
    fn update(&mut self, ctx: &Context, _: &mut Frame) {
        self.poll_answers();

        egui::SidePanel::left("controls")
            .min_width(260.0)
            .show(ctx, |ui| self.controls(ctx, ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Decision tree");
            ui.horizontal(|ui| {
                ui.label(RichText::new("● your path").color(CHOSEN));
                ui.label(RichText::new("● other options").color(OPTION));
            });
            ui.separator();

            let snapshot = self.controller.snapshot();
            egui::ScrollArea::both().show(ui, |ui| match snapshot.tree {
                Some(tree) => draw_node(ui, tree, tree.root()),
                None => {
                    ui.label("The tree grows here once you pick a first word.");
                }
            });
        });
    }
}

/// Application entry point.
fn main() -> eframe::Result {
    env_logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([900.0, 600.0])
            .with_resizable(true),
        ..Default::default()
    };

    eframe::run_native(
        "tree-gen",
        options,
        Box::new(|_| Ok(Box::new(SentenceTreeUI::new()?))),
    )
}
