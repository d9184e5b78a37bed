use std::io::{self, BufRead, Write};

use tree_gen_core::model::candidate::Candidate;
use tree_gen_core::predictor::http::ExplorationClient;
use tree_gen_core::{
    PredictorConfig, RelationshipScorer, Resolution, SessionConfig, SessionState, TreeError,
    TreeGrowthController,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Predictor endpoint, overridable with TREE_GEN_EXPLORE_URL / _TOP_K / _TIMEOUT_SECS
    let config = PredictorConfig::exploration().with_env_overrides("TREE_GEN_EXPLORE");

    // The requested child count follows the predictor's top_k
    let mut controller = TreeGrowthController::new(SessionConfig { target_count: config.top_k });
    let predictor = ExplorationClient::new(config)?;

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    // Ask until the start word is accepted (blank words are rejected)
    let request = loop {
        print!("First word: ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else { return Ok(()) };
        match controller.start(&line?) {
            Ok(request) => break request,
            Err(TreeError::Validation) => println!("Type a word first!"),
            Err(e) => return Err(e.into()),
        }
    };

    let mut pending = Some(request);
    loop {
        if let Some(request) = pending.take() {
            if let Resolution::Grown { degraded: Some(e), .. } = controller.fetch(&predictor, &request) {
                println!("(predictor unavailable, using default words: {e})");
            }
        }
        if controller.state() == SessionState::Finished {
            break;
        }

        println!("\n{}", controller.sentence().join(" "));
        for (index, node) in controller.frontier().iter().enumerate() {
            let probability = node.probability().unwrap_or_default();
            println!("  [{index}] {} ({:.1}%)", node.word(), probability * 100.0);
        }
        print!("Pick a word (s to stop): ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else { break };
        let line = line?;
        if line.trim() == "s" {
            controller.stop()?;
            break;
        }

        let index = match line.trim().parse::<usize>() {
            Ok(index) => index,
            Err(_) => {
                println!("Not a number");
                continue;
            }
        };

        // Explain the pick against the words already chosen
        if let Some(node) = controller.frontier().get(index) {
            let selected = Candidate::new(node.word(), node.probability().unwrap_or_default());
            for score in RelationshipScorer::score(&selected, &controller.sentence()) {
                println!("  {} -> {}% ({})", score.word, score.relationship, score.label.as_str());
            }
        }

        match controller.choose(index) {
            Ok(Some(next)) => pending = Some(next),
            Ok(None) => break,
            Err(e) => println!("{e}"),
        }
    }

    // Stopped by end of input
    if controller.state() != SessionState::Finished {
        controller.stop()?;
    }

    let sentence = controller.sentence();
    println!("\nSentence: {}", sentence.join(" "));
    println!("Words: {}", sentence.len());
    if let Some(tree) = controller.tree() {
        println!("{}", serde_json::to_string_pretty(&tree.to_nested())?);
    }

    Ok(())
}
