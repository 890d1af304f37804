use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use strata_lib::game::config::Endpoints;
use strata_lib::game::update::{ProgressReporter, UpdatePipeline, UpdateSpec};

struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn update_bytes(&self, done: u64, total: u64) {
        if total > 0 {
            println!("[BYTES] {}/{}", done, total);
        } else {
            println!("[BYTES] {}", done);
        }
    }

    fn set_message(&self, message: &str) {
        println!("[MSG] {}", message);
    }

    fn set_step_count(&self, current: u32, total: Option<u32>) {
        println!("[FILES] {}/{:?}", current, total);
    }

    fn done(&self, success: bool, message: Option<&str>) {
        println!("[DONE] success={} message={:?}", success, message);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let version = std::env::args().nth(1).unwrap_or_else(|| "1.5.2".to_string());
    let data_root = PathBuf::from("strata-data");
    let minecraft_root = data_root.join("instances/example/minecraft");

    println!("Updating example instance to {}", version);
    let spec = UpdateSpec::new(version, data_root, minecraft_root);
    let mut pipeline = UpdatePipeline::new(spec, Endpoints::default(), Arc::new(ConsoleReporter))?;
    pipeline.run().await?;

    println!(
        "Effective profile: main class {}",
        pipeline
            .profile()
            .map(|p| p.main_class.as_str())
            .unwrap_or("<none>")
    );
    Ok(())
}
