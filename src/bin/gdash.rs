use std::env;
use std::process;

use gitdash::aggregate::{collect_stats, within};
use gitdash::config::Config;
use gitdash::github::GithubClient;
use gitdash::validate::{clamp_limit, validate_username, DEFAULT_LIMIT};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    // Validation needs no configuration or network access.
    if args[1] == "check" {
        if args.len() != 3 {
            eprintln!("Usage: {} check <username>", args[0]);
            process::exit(1);
        }
        check_username(&args[2]);
        return;
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {:#}", e);
            process::exit(1);
        }
    };

    let client = match GithubClient::new(&config) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to create GitHub client: {}", e);
            process::exit(1);
        }
    };

    match args[1].as_str() {
        "stats" => {
            if args.len() != 3 && args.len() != 4 {
                eprintln!("Usage: {} stats <username> [limit]", args[0]);
                process::exit(1);
            }
            let limit = match args.get(3).map(|raw| raw.parse::<i64>()) {
                None => DEFAULT_LIMIT,
                Some(Ok(n)) => n,
                Some(Err(_)) => {
                    eprintln!("limit must be an integer, got '{}'", args[3]);
                    process::exit(1);
                }
            };
            show_stats(&client, &config, &args[2], clamp_limit(limit)).await;
        }
        "repos" => {
            if args.len() != 3 {
                eprintln!("Usage: {} repos <username>", args[0]);
                process::exit(1);
            }
            list_repos(&client, &config, &args[2]).await;
        }
        "user" => {
            if args.len() != 3 {
                eprintln!("Usage: {} user <username>", args[0]);
                process::exit(1);
            }
            show_user(&client, &config, &args[2]).await;
        }
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            print_usage();
            process::exit(1);
        }
    }
}

fn print_usage() {
    println!("GitDash command-line client");
    println!();
    println!("USAGE:");
    println!("    gdash stats <username> [limit]  - Commit statistics (limit 1-50, default 10)");
    println!("    gdash repos <username>          - List all repositories");
    println!("    gdash user <username>           - Show the GitHub profile");
    println!("    gdash check <username>          - Validate a username");
    println!();
    println!("EXAMPLES:");
    println!("    gdash stats octocat");
    println!("    gdash stats octocat 25");
    println!("    gdash repos octocat");
    println!();
    println!("ENVIRONMENT:");
    println!("    GITHUB_TOKEN   - GitHub token; enables the batched GraphQL query");
    println!("    SECRETS_FILE   - JSON file with a github_token key (default: secrets.json)");
    println!("    GITHUB_API_URL - GitHub API base (default: https://api.github.com)");
}

fn require_valid(username: &str) -> &str {
    match validate_username(username) {
        Ok(name) => name,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => {
            eprintln!("Failed to render JSON: {}", e);
            process::exit(1);
        }
    }
}

async fn show_stats(client: &GithubClient, config: &Config, username: &str, limit: u32) {
    let username = require_valid(username);
    match within(config.request_timeout, collect_stats(client, username, limit, None)).await {
        Ok(summary) => print_json(&summary),
        Err(e) => {
            eprintln!("Failed to fetch stats for '{}': {}", username, e);
            process::exit(1);
        }
    }
}

async fn list_repos(client: &GithubClient, config: &Config, username: &str) {
    let username = require_valid(username);
    match within(config.request_timeout, client.list_all_repos(username)).await {
        Ok(repos) => {
            if repos.is_empty() {
                println!("No repositories found");
                return;
            }
            for repo in &repos {
                let name = repo
                    .get("full_name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("<unnamed>");
                println!("  {}", name);
            }
            println!("{} repositories", repos.len());
        }
        Err(e) => {
            eprintln!("Failed to list repositories for '{}': {}", username, e);
            process::exit(1);
        }
    }
}

async fn show_user(client: &GithubClient, config: &Config, username: &str) {
    let username = require_valid(username);
    match within(config.request_timeout, client.get_user(username)).await {
        Ok(user) => print_json(&user),
        Err(e) => {
            eprintln!("Failed to fetch user '{}': {}", username, e);
            process::exit(1);
        }
    }
}

fn check_username(username: &str) {
    match validate_username(username) {
        Ok(_) => println!("✓ '{}' is a valid GitHub username", username),
        Err(e) => {
            println!("! '{}' is not valid: {}", username, e);
            process::exit(1);
        }
    }
}
