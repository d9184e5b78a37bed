use std::env;

use actix_cors::Cors;
use actix_web::{post, web, App, HttpResponse, HttpServer, Responder};
use serde::{Deserialize, Serialize};

use word_model::WordModel;

mod io;
mod word_model;

/// Upper bound on `top_k`, whatever the client asks for.
const MAX_TOP_K: usize = 20;

/// Body of both prediction endpoints.
///
/// `max_new_tokens` is accepted for the completion contract and ignored:
/// the model only ever predicts one word ahead.
#[derive(Deserialize)]
struct PredictBody {
	text: String,
	top_k: Option<usize>,
	#[allow(dead_code)]
	max_new_tokens: Option<usize>,
}

impl PredictBody {
	fn top_k(&self, default: usize) -> usize {
		self.top_k.unwrap_or(default).min(MAX_TOP_K)
	}
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct ExplorationCandidate {
	word: String,
	prob: f32,
	new_text: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct CompletionCandidate {
	word: String,
	prob: f32,
}

#[derive(Serialize, Deserialize, Debug)]
struct CandidatesResponse<T> {
	candidates: Vec<T>,
}

/// HTTP POST endpoint `/predict` (exploration contract).
///
/// Returns the ranked next words for `text`, each with the extended phrase.
#[post("/predict")]
async fn post_predict(model: web::Data<WordModel>, body: web::Json<PredictBody>) -> impl Responder {
	let text = body.text.trim();
	let candidates: Vec<ExplorationCandidate> = model
		.predict(text, body.top_k(3))
		.into_iter()
		.map(|(word, prob)| {
			let new_text = if text.is_empty() { word.clone() } else { format!("{text} {word}") };
			ExplorationCandidate { word, prob, new_text }
		})
		.collect();

	log::debug!("/predict {text:?}");
	HttpResponse::Ok().json(CandidatesResponse { candidates })
}

/// HTTP POST endpoint `/complete` (completion contract).
#[post("/complete")]
async fn post_complete(model: web::Data<WordModel>, body: web::Json<PredictBody>) -> impl Responder {
	let candidates: Vec<CompletionCandidate> = model
		.predict(body.text.trim(), body.top_k(4))
		.into_iter()
		.map(|(word, prob)| CompletionCandidate { word, prob })
		.collect();

	log::debug!("/complete {:?}", body.text);
	HttpResponse::Ok().json(CandidatesResponse { candidates })
}

/// Main entry point for the reference prediction service.
///
/// # Notes
/// - Binds to `TREE_GEN_BIND` (default 127.0.0.1:8001).
/// - Learns from `TREE_GEN_CORPUS` (default ./data/corpus.txt); if the corpus
///   cannot be read, the service still starts and answers with no candidates.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
	env_logger::init();

	let bind = env::var("TREE_GEN_BIND").unwrap_or_else(|_| "127.0.0.1:8001".to_owned());
	let corpus = env::var("TREE_GEN_CORPUS").unwrap_or_else(|_| "./data/corpus.txt".to_owned());

	let model = match WordModel::new(&corpus) {
		Ok(model) => model,
		Err(e) => {
			log::warn!("cannot load corpus {corpus}: {e}; serving an empty model");
			WordModel::default()
		}
	};
	let shared_model = web::Data::new(model);

	log::info!("listening on {bind}");
	HttpServer::new(move || {
		App::new()
			.wrap(Cors::permissive())
			.app_data(shared_model.clone())
			.service(post_predict)
			.service(post_complete)
	})
		.bind(bind.as_str())?
		.run()
		.await
}
