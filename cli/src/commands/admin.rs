use clap::Subcommand;
use serde_json::json;

#[derive(Subcommand)]
pub enum AdminCommands {
    /// Generate a new gateway API key (set it as BUREAU_API_KEY on the server)
    CreateKey,
}

pub fn run(command: AdminCommands) -> i32 {
    match command {
        AdminCommands::CreateKey => create_key(),
    }
}

fn create_key() -> i32 {
    let (full_key, key_hash) = bureau_core::auth::generate_api_key();
    let prefix = bureau_core::auth::key_prefix(&full_key);

    let output = json!({
        "api_key": full_key,
        "key_prefix": prefix,
        "key_hash": key_hash,
        "warning": "Store this key securely. It will NOT be shown again."
    });
    match serde_json::to_string_pretty(&output) {
        Ok(formatted) => println!("{formatted}"),
        Err(_) => println!("{output}"),
    }
    0
}
