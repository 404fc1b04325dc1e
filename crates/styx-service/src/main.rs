//! Main entry point for the Styx settlement service.
//!
//! `styx serve` builds the swap engine from configuration and exposes it
//! over HTTP. The remaining subcommands work offline on instruction blobs
//! and compressed amounts.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use styx_config::Config;
use styx_core::{StyxFactories, SwapEngine, SwapEngineBuilder};

mod apis;
mod cli;
mod server;

/// Command-line arguments for the Styx service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info", global = true)]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Run the engine and the HTTP API
	Serve {
		/// Path to configuration file
		#[arg(short, long, default_value = "config.toml")]
		config: PathBuf,
	},
	/// Encode instruction JSON to hex
	Encode {
		#[arg(long)]
		json: String,
	},
	/// Decode a hex instruction to JSON
	Decode {
		#[arg(long)]
		data: String,
	},
	/// Compress a decimal amount
	Compress {
		#[arg(long)]
		amount: String,
	},
	/// Expand a raw compressed amount
	Uncompress {
		#[arg(long)]
		raw: u64,
	},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	match args.command {
		Command::Serve { config } => serve(config).await,
		Command::Encode { json } => {
			println!("{}", cli::encode_json(&json)?);
			Ok(())
		},
		Command::Decode { data } => {
			println!("{}", cli::decode_hex(&data)?);
			Ok(())
		},
		Command::Compress { amount } => {
			println!("{}", cli::compress_amount(&amount)?);
			Ok(())
		},
		Command::Uncompress { raw } => {
			println!("{}", cli::uncompress_raw(raw));
			Ok(())
		},
	}
}

async fn serve(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
	tracing::info!("Started styx");

	let path = config_path
		.to_str()
		.ok_or_else(|| format!("Config path is not valid UTF-8: {}", config_path.display()))?;
	let config = Config::from_file(path).await?;
	tracing::info!(
		engine = %config.engine.address,
		chain_id = config.engine.chain_id,
		"Loaded configuration"
	);

	let engine = Arc::new(build_engine(config.clone()).await?);
	let cleanup = tokio::spawn(run_storage_cleanup(
		engine.clone(),
		Duration::from_secs(config.storage.cleanup_interval_seconds),
	));

	let api_config = config.api.clone().filter(|api| api.enabled);
	let result = match api_config {
		Some(api_config) => {
			tokio::select! {
				result = server::start_server(api_config, engine.clone()) => {
					tracing::info!("API server finished");
					result
				}
				_ = tokio::signal::ctrl_c() => {
					tracing::info!("Received shutdown signal");
					Ok(())
				}
			}
		},
		None => {
			tracing::warn!("API disabled; serving nothing until interrupted");
			tokio::signal::ctrl_c().await?;
			Ok(())
		},
	};

	cleanup.abort();
	tracing::info!("Stopped styx");
	result
}

/// Builds the swap engine with every implementation shipped in the workspace.
async fn build_engine(config: Config) -> Result<SwapEngine, Box<dyn std::error::Error>> {
	let factories = StyxFactories::all();
	Ok(SwapEngineBuilder::new(config).build(factories).await?)
}

/// Drops expired storage entries every `interval`.
async fn run_storage_cleanup(engine: Arc<SwapEngine>, interval: Duration) {
	let mut ticker = tokio::time::interval(interval);
	// the first tick completes immediately
	ticker.tick().await;
	loop {
		ticker.tick().await;
		match engine.storage().cleanup_expired().await {
			Ok(0) => {},
			Ok(removed) => tracing::debug!(removed, "Cleaned up expired storage entries"),
			Err(e) => tracing::warn!(error = %e, "Storage cleanup failed"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{address, Address, U256};
	use alloy_signer::SignerSync;
	use alloy_signer_local::PrivateKeySigner;
	use std::str::FromStr;
	use styx_codec::{compress, encode, uncompress, CompactSignature, Instruction, InstructionKind};
	use styx_permit::{SignedTransferOrder, SwapWitness, TokenPermissions, TransferAuthority};
	use styx_registry::AddressTable;
	use styx_types::{
		AddressIndex, DecodeRequest, ExecuteRequest, QuoteRequest, RegisterTokenRequest,
		SlippageTier, Venue, NATIVE_ASSET,
	};

	const TOKEN_A: Address = address!("1000000000000000000000000000000000000001");
	const TOKEN_B: Address = address!("2000000000000000000000000000000000000002");
	const KEEPER: Address = address!("4000000000000000000000000000000000000004");
	const ENGINE: Address = address!("e000000000000000000000000000000000000000");
	const WETH: Address = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");

	/// Config with a 1:1 adapter at id 1 and a funded, permit-approved user.
	fn config(user: Address) -> Config {
		let toml = format!(
			r#"
[engine]
address = "{engine}"
chain_id = 1
permit2 = "0x000000000022d473030f116ddee9f6b43ac78ba3"
wrapped_native = "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"

[storage]
primary = "memory"
[storage.implementations.memory]

[registry]
keepers = ["{keeper}"]
tokens = ["{a}", "{b}"]

[[adapters]]
id = 1
kind = "fixed_rate"
target = "0xa000000000000000000000000000000000000001"
numerator = 1
denominator = 1

[[ledger.balances]]
token = "{a}"
holder = "{user}"
amount = "1000"

[[ledger.balances]]
token = "{b}"
holder = "0xa000000000000000000000000000000000000001"
amount = "1000"

[[ledger.balances]]
token = "{native}"
holder = "{keeper}"
amount = "50"

[[ledger.balances]]
token = "{native}"
holder = "{user}"
amount = "50"

[[ledger.approvals]]
token = "{a}"
owner = "{user}"
spender = "0x000000000022d473030f116ddee9f6b43ac78ba3"
amount = "1000"
"#,
			engine = ENGINE,
			keeper = KEEPER,
			a = TOKEN_A,
			b = TOKEN_B,
			native = NATIVE_ASSET,
			user = user,
		);
		Config::from_str(&toml).unwrap()
	}

	#[test]
	fn test_args_parse_subcommands() {
		let args = Args::parse_from(["styx", "serve", "--config", "custom.toml"]);
		assert!(matches!(args.command, Command::Serve { ref config } if config == &PathBuf::from("custom.toml")));
		assert_eq!(args.log_level, "info");

		let args = Args::parse_from(["styx", "--log-level", "debug", "uncompress", "--raw", "32"]);
		assert!(matches!(args.command, Command::Uncompress { raw: 32 }));
		assert_eq!(args.log_level, "debug");
	}

	#[tokio::test]
	async fn test_build_engine_from_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("config.toml");
		let mut toml = "[engine]\n".to_string();
		toml.push_str("address = \"0xe000000000000000000000000000000000000000\"\n");
		toml.push_str("chain_id = 1\n");
		toml.push_str("permit2 = \"0x000000000022d473030f116ddee9f6b43ac78ba3\"\n");
		toml.push_str("wrapped_native = \"0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2\"\n");
		toml.push_str("[storage]\nprimary = \"memory\"\n[storage.implementations.memory]\n");
		tokio::fs::write(&path, toml).await.unwrap();

		let config = Config::from_file(path.to_str().unwrap()).await.unwrap();
		let engine = build_engine(config).await.unwrap();
		assert_eq!(engine.address(), ENGINE);
		assert_eq!(engine.tokens().len().await, 0);
	}

	#[tokio::test]
	async fn test_execute_then_fetch_settlement() {
		let signer = PrivateKeySigner::random();
		let user = signer.address();
		let engine = build_engine(config(user)).await.unwrap();

		let amount_in = compress(U256::from(100u64)).unwrap();
		let amount_out = compress(U256::from(100u64)).unwrap();
		let order = SignedTransferOrder {
			permitted: TokenPermissions {
				token: TOKEN_A,
				amount: uncompress(amount_in),
			},
			spender: ENGINE,
			nonce: 1,
			deadline: u32::MAX.into(),
		};
		let witness = SwapWitness {
			beneficiary: user,
			token_out: TOKEN_B,
			amount_out: uncompress(amount_out),
			fee_bps: 0,
			slippage_tier: 0,
			adapter_id: 1,
		};
		let digest = engine.authority().digest(&order, &witness);
		let instruction = Instruction {
			kind: InstructionKind::Explicit {
				amount_in,
				nonce: 1,
				deadline: u32::MAX,
				signature: CompactSignature::from(signer.sign_hash_sync(&digest).unwrap()),
			},
			slippage_tier: SlippageTier::new(0).unwrap(),
			venue: Venue::Adapter(1),
			fee_bps: 0,
			amount_out,
			token_in: AddressIndex::new(0).unwrap(),
			token_out: AddressIndex::new(1).unwrap(),
			beneficiary: user,
			payload: Default::default(),
		};

		let response = apis::execute::process_execute_request(
			ExecuteRequest {
				value: U256::ZERO,
				data: encode(&instruction).unwrap(),
			},
			&engine,
			Some(KEEPER),
		)
		.await
		.unwrap();
		assert_eq!(response.record.actual_amount_out, U256::from(100u64));

		let stored =
			apis::settlements::get_settlement_by_id(&response.settlement_id, &engine)
				.await
				.unwrap();
		assert_eq!(stored, response.record);

		let missing = apis::settlements::get_settlement_by_id("nope", &engine)
			.await
			.unwrap_err();
		assert_eq!(missing.status_code(), 404);

		// replay surfaces the engine's code
		let replay = apis::execute::process_execute_request(
			ExecuteRequest {
				value: U256::ZERO,
				data: encode(&instruction).unwrap(),
			},
			&engine,
			Some(KEEPER),
		)
		.await
		.unwrap_err();
		assert_eq!(replay.status_code(), 422);
		assert_eq!(replay.to_error_response().error, "nonce_reused");
	}

	#[tokio::test]
	async fn test_execute_requires_relayer() {
		let engine = build_engine(config(Address::repeat_byte(0x77))).await.unwrap();
		let err = apis::execute::process_execute_request(
			ExecuteRequest {
				value: U256::ZERO,
				data: vec![0u8; 8].into(),
			},
			&engine,
			None,
		)
		.await
		.unwrap_err();
		assert_eq!(err.status_code(), 500);
		assert_eq!(err.to_error_response().error, "relayer_not_configured");
	}

	#[tokio::test]
	async fn test_native_in_is_paid_by_relayer_only() {
		let victim = Address::repeat_byte(0x77);
		let attacker = Address::repeat_byte(0x66);
		let engine = build_engine(config(victim)).await.unwrap();
		let weth = apis::tokens::register_token(RegisterTokenRequest { address: WETH }, &engine)
			.await
			.unwrap();

		let instruction = Instruction {
			kind: InstructionKind::NativeIn,
			slippage_tier: SlippageTier::new(0).unwrap(),
			venue: Venue::Adapter(1),
			fee_bps: 0,
			amount_out: compress(U256::from(10u64)).unwrap(),
			token_in: weth.index,
			token_out: AddressIndex::new(1).unwrap(),
			beneficiary: attacker,
			payload: Default::default(),
		};
		// A caller named in the body is not part of the request.
		let body = serde_json::json!({
			"caller": victim,
			"value": "10",
			"data": encode(&instruction).unwrap(),
		});
		let request: ExecuteRequest = serde_json::from_value(body).unwrap();

		let response = apis::execute::process_execute_request(request, &engine, Some(KEEPER))
			.await
			.unwrap();
		assert_eq!(response.record.actual_amount_out, U256::from(10u64));
		assert_eq!(engine.ledger().native_balance(victim).await, U256::from(50u64));
		assert_eq!(engine.ledger().native_balance(KEEPER).await, U256::from(40u64));
		assert_eq!(
			engine.ledger().balance_of(TOKEN_B, attacker).await,
			U256::from(10u64)
		);
	}

	#[tokio::test]
	async fn test_token_endpoints() {
		let engine = build_engine(config(Address::repeat_byte(0x77))).await.unwrap();

		let token = apis::tokens::get_token("1", &engine).await.unwrap();
		assert_eq!(token.address, TOKEN_B);
		assert_eq!(
			apis::tokens::get_token("9", &engine).await.unwrap_err().status_code(),
			404
		);
		assert_eq!(
			apis::tokens::get_token("x", &engine).await.unwrap_err().status_code(),
			400
		);

		let new_token = Address::repeat_byte(0x33);
		let registered = apis::tokens::register_token(
			RegisterTokenRequest { address: new_token },
			&engine,
		)
		.await
		.unwrap();
		assert_eq!(registered.index.value(), 2);
		let again = apis::tokens::register_token(
			RegisterTokenRequest { address: new_token },
			&engine,
		)
		.await
		.unwrap();
		assert_eq!(again.index, registered.index);
	}

	#[tokio::test]
	async fn test_quote_and_codec_endpoints() {
		let engine = build_engine(config(Address::repeat_byte(0x77))).await.unwrap();

		let quote = apis::quote::process_quote_request(
			QuoteRequest {
				adapter_id: 1,
				token_in: TOKEN_A,
				token_out: TOKEN_B,
				amount_in: U256::from(250u64),
			},
			&engine,
		)
		.await
		.unwrap();
		assert_eq!(quote.amount_in, U256::from(250u64));
		assert_eq!(quote.amount_out, U256::from(250u64));

		let bad = apis::codec::process_decode_request(DecodeRequest {
			data: vec![0xc0u8].into(),
		})
		.unwrap_err();
		assert_eq!(bad.status_code(), 400);
	}
}
