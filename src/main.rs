//! btcauth - Bitcoin signed-message login tool
//!
//! Run modes:
//!   btcauth classify <address>                               - Classify and decode an address
//!   btcauth hash <message>                                   - Print the signed-message digest
//!   btcauth verify <address> <message> <signature>           - Verify a wallet signature
//!   btcauth challenge <address>                              - Issue a login challenge
//!   btcauth login <address> <nonce> <timestamp> <signature>  - Redeem a challenge
//!   btcauth purge                                            - Drop expired challenges
//!   btcauth config                                           - Show configuration
//!
//! `challenge`, `login` and `purge` share state through the nonce store named by
//! `BTCAUTH_NONCE_STORE`, so a challenge issued by one invocation can be
//! redeemed by the next. Only the persistent `sqlite` store is accepted there.

use btcauth::address;
use btcauth::common::{init_from_config, AuthConfig, BtcAuthError, Result};
use btcauth::{message_hash, ChallengeService, SignatureVerifier, Verification};
use std::env;
use std::process;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let config = match AuthConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(2);
        }
    };

    if let Err(e) = init_from_config(&config) {
        eprintln!("Warning: {}", e);
    }

    let result = match args[1].as_str() {
        "classify" => run_classify(&args[2..]),
        "hash" => run_hash(&args[2..]),
        "verify" => run_verify(&args[2..]),
        "challenge" => run_challenge(&config, &args[2..]).await,
        "login" => run_login(&config, &args[2..]).await,
        "purge" => run_purge(&config).await,
        "config" => {
            config.print_summary();
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            print_usage();
            Err(BtcAuthError::validation(format!("unknown command: {}", other)))
        }
    };

    if let Err(e) = result {
        eprintln!("Error [{}]: {}", e.error_code(), e);
        process::exit(1);
    }
}

fn print_usage() {
    println!("btcauth - Bitcoin signed-message login");
    println!();
    println!("Usage:");
    println!("  btcauth classify <address>                               Classify and decode an address");
    println!("  btcauth hash <message>                                   Print the signed-message digest");
    println!("  btcauth verify <address> <message> <signature>           Verify a base64 wallet signature");
    println!("  btcauth challenge <address>                              Issue a login challenge");
    println!("  btcauth login <address> <nonce> <timestamp> <signature>  Redeem a challenge");
    println!("  btcauth purge                                            Drop expired challenges");
    println!("  btcauth config                                           Show configuration");
    println!();
    println!("Environment Variables:");
    println!("  BTCAUTH_NETWORK             mainnet, testnet or any (default: any)");
    println!("  BTCAUTH_CHALLENGE_TTL_SECS  Challenge lifetime in seconds (default: 300)");
    println!("  BTCAUTH_APP_NAME            Name shown in the challenge message");
    println!("  BTCAUTH_NONCE_STORE         sqlite or memory (default: sqlite; CLI needs sqlite)");
    println!("  BTCAUTH_SQLITE_PATH         Challenge database (default: data/challenges.db)");
    println!("  BTCAUTH_LOG_LEVEL           trace, debug, info, warn, error");
    println!("  BTCAUTH_LOG_JSON            1 for JSON log lines");
}

/// Positional arguments, exactly `N` of them
fn positional<'a, const N: usize>(args: &'a [String], usage: &str) -> Result<[&'a str; N]> {
    if args.len() != N {
        return Err(BtcAuthError::validation(format!("usage: btcauth {}", usage)));
    }
    let mut out = [""; N];
    for (slot, arg) in out.iter_mut().zip(args) {
        *slot = arg.as_str();
    }
    Ok(out)
}

fn run_classify(args: &[String]) -> Result<()> {
    let [addr] = positional::<1>(args, "classify <address>")?;

    let decoded = address::decode(addr)?;
    println!("Address: {}", addr);
    println!("Family:  {}", decoded.family);
    println!("Network: {}", decoded.network);
    println!("Payload: {}", hex::encode(&decoded.payload));
    println!(
        "Scheme:  {}",
        if decoded.family.uses_ecdsa() {
            "ECDSA (recoverable)"
        } else {
            "Schnorr (BIP-340)"
        }
    );
    Ok(())
}

fn run_hash(args: &[String]) -> Result<()> {
    let [message] = positional::<1>(args, "hash <message>")?;
    println!("{}", message_hash(message));
    Ok(())
}

fn run_verify(args: &[String]) -> Result<()> {
    let [addr, message, signature] =
        positional::<3>(args, "verify <address> <message> <signature>")?;

    let verifier = SignatureVerifier::new();
    match verifier.verify(addr, message, signature)? {
        Verification::Valid { .. } => {
            println!("VALID: signature proves control of {}", addr);
            Ok(())
        }
        Verification::Invalid(failure) => {
            println!("INVALID: {}", failure);
            process::exit(3);
        }
    }
}

fn open_service(config: &AuthConfig) -> Result<ChallengeService> {
    let store = config.open_persistent_nonce_store()?;
    Ok(ChallengeService::new(store, config.challenge_config()))
}

async fn run_challenge(config: &AuthConfig, args: &[String]) -> Result<()> {
    let [addr] = positional::<1>(args, "challenge <address>")?;

    let service = open_service(config)?;
    let challenge = service.request_challenge(addr).await?;

    println!("=== Challenge ===");
    println!("Nonce:      {}", challenge.nonce);
    println!("Issued At:  {}", challenge.issued_at);
    println!("Expires In: {} seconds", challenge.expires_in_seconds);
    println!();
    println!("Sign exactly this message with your wallet:");
    println!("-----");
    println!("{}", challenge.message);
    println!("-----");
    Ok(())
}

async fn run_login(config: &AuthConfig, args: &[String]) -> Result<()> {
    let [addr, nonce, timestamp, signature] =
        positional::<4>(args, "login <address> <nonce> <timestamp> <signature>")?;

    let service = open_service(config)?;
    let authenticated = service
        .verify_challenge(addr, signature, nonce, timestamp)
        .await?;

    println!(
        "AUTHENTICATED: {} ({}, {})",
        authenticated.address, authenticated.family, authenticated.network
    );
    Ok(())
}

async fn run_purge(config: &AuthConfig) -> Result<()> {
    let store = config.open_persistent_nonce_store()?;
    let removed = store.purge_expired().await?;
    println!("Removed {} expired challenge(s)", removed);
    Ok(())
}
