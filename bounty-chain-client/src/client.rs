use std::{str::FromStr, sync::Arc};

use async_trait::async_trait;
use bounty_primitives::{agent::AgentType, finding::Severity, validation::ValidationOutcome, Wei};
use bounty_settings::ChainSettings;
use ethers::{
	abi::{Abi, Address, RawLog},
	contract::Contract,
	middleware::SignerMiddleware,
	providers::{Http, Middleware, Provider},
	signers::{LocalWallet, Signer},
	types::{Filter, Log, TransactionReceipt, H256, U256},
};
use tokio::sync::Mutex;

use crate::{
	abi,
	error::{ChainError, Result},
	types::{severity_tag, AgentOnChain, BountyReceipt, BountyReleasedEvent, OnChainBounty, OnChainProtocol, Role},
};

type SignerMw = SignerMiddleware<Provider<Http>, LocalWallet>;

#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait ChainClientApi: Send + Sync {
	async fn register_protocol(
		&self,
		owner: &str,
		source_url: &str,
		branch: &str,
		contract_path: &str,
		contract_name: &str,
	) -> Result<u64>;
	async fn get_protocol(&self, protocol_id: u64) -> Result<OnChainProtocol>;
	async fn is_github_url_registered(&self, source_url: &str) -> Result<bool>;
	async fn get_protocol_id_by_github_url(&self, source_url: &str) -> Result<Option<u64>>;

	async fn deposit_bounty(&self, protocol_id: u64, amount: Wei) -> Result<String>;
	async fn release_bounty(
		&self,
		protocol_id: u64,
		validation_id: u64,
		researcher: &str,
		severity: Severity,
	) -> Result<BountyReceipt>;
	async fn calculate_bounty_amount(&self, protocol_id: u64, severity: Severity) -> Result<Wei>;
	async fn get_protocol_balance(&self, protocol_id: u64) -> Result<Wei>;
	async fn get_bounty(&self, bounty_id: u64) -> Result<OnChainBounty>;

	async fn record_validation(
		&self,
		finding_id: u64,
		validator_token_id: u64,
		outcome: ValidationOutcome,
		severity: Severity,
		log_digest: [u8; 32],
		proof_hash: [u8; 32],
	) -> Result<u64>;

	async fn register_agent(&self, wallet: &str, agent_type: AgentType) -> Result<u64>;
	async fn get_agent_by_wallet(&self, wallet: &str) -> Result<Option<AgentOnChain>>;

	async fn deposit_escrow_for(&self, agent: &str, amount: Wei) -> Result<String>;
	async fn deduct_submission_fee(&self, agent: &str, amount: Wei) -> Result<()>;
	async fn get_escrow_balance(&self, agent: &str) -> Result<Wei>;
	async fn can_submit_finding(&self, agent: &str, required_fee: Wei) -> Result<bool>;

	async fn erc20_allowance(&self, owner: &str, spender: &str) -> Result<Wei>;
	async fn erc20_approve(&self, spender: &str, amount: Wei) -> Result<String>;
	/// Confirms a settled `tx_hash` actually moved at least `min_amount` of
	/// the configured fee token to `expected_to`, for the x402 raw-hash
	/// fallback path (§6).
	async fn verify_erc20_transfer(&self, tx_hash: &str, expected_to: &str, min_amount: Wei) -> Result<bool>;

	/// Current chain head, for the reconciler to decide how far a catch-up
	/// range can run before it has to stop and wait for the next poll tick.
	async fn latest_block_number(&self) -> Result<u64>;

	/// `BountyPool.BountyReleased` logs in `[from_block, to_block]`
	/// inclusive, oldest first. Used both for the reconciler's startup
	/// catch-up range and its steady-state poll range; there is no
	/// subscription path since the client only holds an HTTP provider.
	async fn get_bounty_released_events(&self, from_block: u64, to_block: u64) -> Result<Vec<BountyReleasedEvent>>;
}

pub struct EthersChainClient {
	payer: Arc<SignerMw>,
	researcher: Option<Arc<SignerMw>>,
	payer_lock: Mutex<()>,
	researcher_lock: Mutex<()>,
	protocol_registry: Contract<SignerMw>,
	bounty_pool: Contract<SignerMw>,
	validation_registry: Contract<SignerMw>,
	escrow: Contract<SignerMw>,
	agent_identity: Contract<SignerMw>,
	erc20: Contract<SignerMw>,
}

impl EthersChainClient {
	pub async fn new(settings: &ChainSettings) -> Result<Self> {
		let provider = Provider::<Http>::try_from(settings.http_node_endpoint.as_str())
			.map_err(|e| ChainError::Network(format!("bad RPC endpoint: {e}")))?;
		let chain_id = provider
			.get_chainid()
			.await
			.map_err(|e| ChainError::Network(format!("fetching chain id: {e}")))?;

		let payer_wallet = load_wallet(&settings.payer_private_key_file)?.with_chain_id(chain_id.as_u64());
		let payer = Arc::new(SignerMiddleware::new(provider.clone(), payer_wallet));

		let researcher = match &settings.researcher_private_key_file {
			Some(path) => {
				let wallet = load_wallet(path)?.with_chain_id(chain_id.as_u64());
				Some(Arc::new(SignerMiddleware::new(provider.clone(), wallet)))
			}
			None => None,
		};

		let protocol_registry_addr = parse_address(&settings.protocol_registry_address)?;
		let bounty_pool_addr = parse_address(&settings.bounty_pool_address)?;
		let validation_registry_addr = parse_address(&settings.validation_registry_address)?;
		let escrow_addr = parse_address(&settings.escrow_address)?;
		let agent_identity_addr = parse_address(&settings.agent_identity_address)?;
		let erc20_addr = parse_address(&settings.fee_token_address)?;

		Ok(Self {
			protocol_registry: Contract::new(protocol_registry_addr, abi::protocol_registry().clone(), payer.clone()),
			bounty_pool: Contract::new(bounty_pool_addr, abi::bounty_pool().clone(), payer.clone()),
			validation_registry: Contract::new(
				validation_registry_addr,
				abi::validation_registry().clone(),
				payer.clone(),
			),
			escrow: Contract::new(escrow_addr, abi::escrow().clone(), payer.clone()),
			agent_identity: Contract::new(agent_identity_addr, abi::agent_identity().clone(), payer.clone()),
			erc20: Contract::new(erc20_addr, abi::erc20().clone(), payer.clone()),
			payer,
			researcher,
			payer_lock: Mutex::new(()),
			researcher_lock: Mutex::new(()),
		})
	}

	fn signer_for(&self, role: Role) -> Result<&Arc<SignerMw>> {
		match role {
			Role::Payer => Ok(&self.payer),
			Role::Researcher => self
				.researcher
				.as_ref()
				.ok_or_else(|| ChainError::Network("no researcher signing key configured".into())),
		}
	}

	/// Serializes all sends under the given role's key so two concurrent
	/// callers never race on the same account's nonce (§5).
	async fn send_and_wait(
		&self,
		role: Role,
		contract: &Contract<SignerMw>,
		method: &'static str,
		args: impl ethers::abi::Tokenize,
	) -> Result<TransactionReceipt> {
		let _permit = match role {
			Role::Payer => self.payer_lock.lock().await,
			Role::Researcher => self.researcher_lock.lock().await,
		};
		// Touch the signer so a missing researcher key fails before the call is built.
		self.signer_for(role)?;

		let call = contract
			.method::<_, H256>(method, args)
			.map_err(|e| ChainError::Network(format!("encoding {method}: {e}")))?;
		let pending = call.send().await.map_err(|e| classify_send_error(method, e))?;
		let tx_hash = format!("{:#x}", pending.tx_hash());
		tracing::debug!(method, tx_hash, "submitted chain transaction");
		let receipt = pending
			.confirmations(1)
			.await
			.map_err(|e| ChainError::Network(format!("awaiting receipt for {method}: {e}")))?
			.ok_or_else(|| ChainError::MissingReceipt { hash: tx_hash.clone() })?;

		if receipt.status == Some(0.into()) {
			tracing::warn!(method, tx_hash, "chain transaction reverted");
			return Err(ChainError::Revert { message: format!("{method} reverted"), hash: Some(tx_hash) });
		}
		Ok(receipt)
	}
}

fn load_wallet(path: &str) -> Result<LocalWallet> {
	let raw = std::fs::read_to_string(path)
		.map_err(|e| ChainError::Network(format!("reading private key file {path}: {e}")))?;
	let trimmed = raw.trim().trim_start_matches("0x");
	LocalWallet::from_str(trimmed).map_err(|e| ChainError::Network(format!("parsing private key: {e}")))
}

/// Local checksum check before anything reaches a contract call: a
/// malformed address never produces a transaction, so it is reported the
/// same way a reverted one would be rather than adding a seventh
/// `ChainError` kind the spec doesn't name.
fn parse_address(addr: &str) -> Result<Address> {
	let checksummed = Address::from_str(addr)
		.map_err(|e| ChainError::Revert { message: format!("invalid address {addr}: {e}"), hash: None })?;
	Ok(checksummed)
}

fn classify_send_error(method: &str, err: impl std::fmt::Display) -> ChainError {
	let text = err.to_string();
	if text.contains("insufficient funds") || text.contains("insufficient balance") {
		ChainError::InsufficientBalance { message: text }
	} else if text.contains("timed out") || text.contains("timeout") {
		ChainError::Timeout(format!("{method}: {text}"))
	} else {
		ChainError::Network(format!("{method}: {text}"))
	}
}

fn find_event_param(
	abi_contract: &Abi,
	event_name: &str,
	param_name: &str,
	receipt: &TransactionReceipt,
) -> Result<ethers::abi::Token> {
	let tx_hash = format!("{:#x}", receipt.transaction_hash);
	let event = abi_contract.event(event_name).map_err(|e| ChainError::InvalidReceipt {
		message: format!("abi missing event {event_name}: {e}"),
		hash: Some(tx_hash.clone()),
	})?;
	for log in &receipt.logs {
		if log.topics.first() != Some(&event.signature()) {
			continue;
		}
		let raw = RawLog { topics: log.topics.clone(), data: log.data.to_vec() };
		let parsed = event
			.parse_log(raw)
			.map_err(|e| ChainError::InvalidReceipt { message: e.to_string(), hash: Some(tx_hash.clone()) })?;
		if let Some(param) = parsed.params.into_iter().find(|p| p.name == param_name) {
			return Ok(param.value);
		}
	}
	Err(ChainError::InvalidReceipt {
		message: format!("receipt has no {event_name}.{param_name}"),
		hash: Some(tx_hash),
	})
}

fn token_u64(token: ethers::abi::Token) -> Result<u64> {
	token
		.into_uint()
		.map(|v| v.as_u64())
		.ok_or_else(|| ChainError::InvalidReceipt { message: "expected uint token".into(), hash: None })
}

#[async_trait]
impl ChainClientApi for EthersChainClient {
	async fn register_protocol(
		&self,
		owner: &str,
		source_url: &str,
		branch: &str,
		contract_path: &str,
		contract_name: &str,
	) -> Result<u64> {
		let owner_addr = parse_address(owner)?;
		let receipt = self
			.send_and_wait(
				Role::Payer,
				&self.protocol_registry,
				"registerProtocol",
				(owner_addr, source_url.to_string(), branch.to_string(), contract_path.to_string(), contract_name.to_string()),
			)
			.await?;
		let token = find_event_param(&abi::protocol_registry(), "ProtocolRegistered", "protocolId", &receipt)?;
		token_u64(token)
	}

	async fn get_protocol(&self, protocol_id: u64) -> Result<OnChainProtocol> {
		let (owner, status, total, available, paid): (Address, u8, U256, U256, U256) = self
			.protocol_registry
			.method("getProtocol", U256::from(protocol_id))
			.map_err(|e| ChainError::Network(e.to_string()))?
			.call()
			.await
			.map_err(|e| ChainError::Network(e.to_string()))?;
		Ok(OnChainProtocol {
			owner: format!("{owner:#x}"),
			status,
			total_bounty_pool: Wei(total.as_u128()),
			available_bounty: Wei(available.as_u128()),
			paid_bounty: Wei(paid.as_u128()),
		})
	}

	async fn is_github_url_registered(&self, source_url: &str) -> Result<bool> {
		self.protocol_registry
			.method("isGithubUrlRegistered", source_url.to_string())
			.map_err(|e| ChainError::Network(e.to_string()))?
			.call()
			.await
			.map_err(|e| ChainError::Network(e.to_string()))
	}

	async fn get_protocol_id_by_github_url(&self, source_url: &str) -> Result<Option<u64>> {
		let id: U256 = self
			.protocol_registry
			.method("getProtocolIdByGithubUrl", source_url.to_string())
			.map_err(|e| ChainError::Network(e.to_string()))?
			.call()
			.await
			.map_err(|e| ChainError::Network(e.to_string()))?;
		Ok(if id.is_zero() { None } else { Some(id.as_u64()) })
	}

	async fn deposit_bounty(&self, protocol_id: u64, amount: Wei) -> Result<String> {
		let call = self
			.bounty_pool
			.method::<_, H256>("depositBounty", U256::from(protocol_id))
			.map_err(|e| ChainError::Network(e.to_string()))?
			.value(U256::from(amount.0));
		let _permit = self.payer_lock.lock().await;
		let pending = call.send().await.map_err(|e| classify_send_error("depositBounty", e))?;
		let tx_hash = format!("{:#x}", pending.tx_hash());
		let receipt = pending
			.confirmations(1)
			.await
			.map_err(|e| ChainError::Network(e.to_string()))?
			.ok_or_else(|| ChainError::MissingReceipt { hash: tx_hash.clone() })?;
		if receipt.status == Some(0.into()) {
			return Err(ChainError::Revert { message: "depositBounty reverted".into(), hash: Some(tx_hash) });
		}
		Ok(tx_hash)
	}

	async fn release_bounty(
		&self,
		protocol_id: u64,
		validation_id: u64,
		researcher: &str,
		severity: Severity,
	) -> Result<BountyReceipt> {
		let researcher_addr = parse_address(researcher)?;
		let receipt = self
			.send_and_wait(
				Role::Payer,
				&self.bounty_pool,
				"releaseBounty",
				(U256::from(protocol_id), U256::from(validation_id), researcher_addr, severity_tag(severity)),
			)
			.await?;
		let tx_hash = format!("{:#x}", receipt.transaction_hash);
		let token = find_event_param(&abi::bounty_pool(), "BountyReleased", "bountyId", &receipt)?;
		Ok(BountyReceipt { bounty_id: token_u64(token)?, tx_hash })
	}

	async fn calculate_bounty_amount(&self, protocol_id: u64, severity: Severity) -> Result<Wei> {
		let amount: U256 = self
			.bounty_pool
			.method("calculateBountyAmount", (U256::from(protocol_id), severity_tag(severity)))
			.map_err(|e| ChainError::Network(e.to_string()))?
			.call()
			.await
			.map_err(|e| ChainError::Network(e.to_string()))?;
		Ok(Wei(amount.as_u128()))
	}

	async fn get_protocol_balance(&self, protocol_id: u64) -> Result<Wei> {
		let amount: U256 = self
			.bounty_pool
			.method("getProtocolBalance", U256::from(protocol_id))
			.map_err(|e| ChainError::Network(e.to_string()))?
			.call()
			.await
			.map_err(|e| ChainError::Network(e.to_string()))?;
		Ok(Wei(amount.as_u128()))
	}

	async fn get_bounty(&self, bounty_id: u64) -> Result<OnChainBounty> {
		let (protocol_id, validation_id, researcher, amount, severity): (U256, U256, Address, U256, u8) = self
			.bounty_pool
			.method("getBounty", U256::from(bounty_id))
			.map_err(|e| ChainError::Network(e.to_string()))?
			.call()
			.await
			.map_err(|e| ChainError::Network(e.to_string()))?;
		Ok(OnChainBounty {
			protocol_id: protocol_id.as_u64(),
			validation_id: validation_id.as_u64(),
			researcher: format!("{researcher:#x}"),
			amount: Wei(amount.as_u128()),
			severity,
		})
	}

	async fn record_validation(
		&self,
		finding_id: u64,
		validator_token_id: u64,
		outcome: ValidationOutcome,
		severity: Severity,
		log_digest: [u8; 32],
		proof_hash: [u8; 32],
	) -> Result<u64> {
		let receipt = self
			.send_and_wait(
				Role::Payer,
				&self.validation_registry,
				"recordValidation",
				(
					U256::from(finding_id),
					U256::from(validator_token_id),
					crate::types::outcome_tag(outcome),
					severity_tag(severity),
					log_digest,
					proof_hash,
				),
			)
			.await?;
		let token = find_event_param(&abi::validation_registry(), "ValidationRecorded", "validationId", &receipt)?;
		token_u64(token)
	}

	async fn register_agent(&self, wallet: &str, agent_type: AgentType) -> Result<u64> {
		let wallet_addr = parse_address(wallet)?;
		let tag = match agent_type {
			AgentType::Researcher => 0u8,
			AgentType::Validator => 1u8,
		};
		let receipt = self
			.send_and_wait(Role::Researcher, &self.agent_identity, "registerAgent", (wallet_addr, tag))
			.await?;
		let token = find_event_param(&abi::agent_identity(), "AgentRegistered", "tokenId", &receipt)?;
		token_u64(token)
	}

	async fn get_agent_by_wallet(&self, wallet: &str) -> Result<Option<AgentOnChain>> {
		let wallet_addr = parse_address(wallet)?;
		let (token_id, agent_type, active): (U256, u8, bool) = self
			.agent_identity
			.method("getAgentByWallet", wallet_addr)
			.map_err(|e| ChainError::Network(e.to_string()))?
			.call()
			.await
			.map_err(|e| ChainError::Network(e.to_string()))?;
		if token_id.is_zero() {
			return Ok(None);
		}
		Ok(Some(AgentOnChain { token_id: token_id.as_u64(), agent_type, active }))
	}

	async fn deposit_escrow_for(&self, agent: &str, amount: Wei) -> Result<String> {
		let agent_addr = parse_address(agent)?;
		let call = self
			.escrow
			.method::<_, H256>("depositEscrowFor", agent_addr)
			.map_err(|e| ChainError::Network(e.to_string()))?
			.value(U256::from(amount.0));
		let _permit = self.researcher_lock.lock().await;
		self.signer_for(Role::Researcher)?;
		let pending = call.send().await.map_err(|e| classify_send_error("depositEscrowFor", e))?;
		let tx_hash = format!("{:#x}", pending.tx_hash());
		let receipt = pending
			.confirmations(1)
			.await
			.map_err(|e| ChainError::Network(e.to_string()))?
			.ok_or_else(|| ChainError::MissingReceipt { hash: tx_hash.clone() })?;
		if receipt.status == Some(0.into()) {
			return Err(ChainError::Revert { message: "depositEscrowFor reverted".into(), hash: Some(tx_hash) });
		}
		Ok(tx_hash)
	}

	async fn deduct_submission_fee(&self, agent: &str, amount: Wei) -> Result<()> {
		let agent_addr = parse_address(agent)?;
		self.send_and_wait(Role::Payer, &self.escrow, "deductSubmissionFee", (agent_addr, U256::from(amount.0)))
			.await?;
		Ok(())
	}

	async fn get_escrow_balance(&self, agent: &str) -> Result<Wei> {
		let agent_addr = parse_address(agent)?;
		let balance: U256 = self
			.escrow
			.method("getEscrowBalance", agent_addr)
			.map_err(|e| ChainError::Network(e.to_string()))?
			.call()
			.await
			.map_err(|e| ChainError::Network(e.to_string()))?;
		Ok(Wei(balance.as_u128()))
	}

	async fn can_submit_finding(&self, agent: &str, required_fee: Wei) -> Result<bool> {
		let agent_addr = parse_address(agent)?;
		self.escrow
			.method("canSubmitFinding", (agent_addr, U256::from(required_fee.0)))
			.map_err(|e| ChainError::Network(e.to_string()))?
			.call()
			.await
			.map_err(|e| ChainError::Network(e.to_string()))
	}

	async fn erc20_allowance(&self, owner: &str, spender: &str) -> Result<Wei> {
		let owner_addr = parse_address(owner)?;
		let spender_addr = parse_address(spender)?;
		let remaining: U256 = self
			.erc20
			.method("allowance", (owner_addr, spender_addr))
			.map_err(|e| ChainError::Network(e.to_string()))?
			.call()
			.await
			.map_err(|e| ChainError::Network(e.to_string()))?;
		Ok(Wei(remaining.as_u128()))
	}

	async fn erc20_approve(&self, spender: &str, amount: Wei) -> Result<String> {
		let spender_addr = parse_address(spender)?;
		let receipt = self
			.send_and_wait(Role::Researcher, &self.erc20, "approve", (spender_addr, U256::from(amount.0)))
			.await?;
		Ok(format!("{:#x}", receipt.transaction_hash))
	}

	async fn verify_erc20_transfer(&self, tx_hash: &str, expected_to: &str, min_amount: Wei) -> Result<bool> {
		let hash = H256::from_str(tx_hash.trim_start_matches("0x"))
			.map_err(|e| ChainError::InvalidReceipt { message: format!("malformed tx hash: {e}"), hash: None })?;
		let expected_to = parse_address(expected_to)?;

		let receipt = self
			.payer
			.get_transaction_receipt(hash)
			.await
			.map_err(|e| ChainError::Network(e.to_string()))?
			.ok_or_else(|| ChainError::MissingReceipt { hash: tx_hash.to_string() })?;

		if receipt.status == Some(0.into()) {
			return Ok(false);
		}

		let transfer = abi::erc20()
			.event("Transfer")
			.map_err(|e| ChainError::InvalidReceipt { message: e.to_string(), hash: Some(tx_hash.to_string()) })?;
		for log in &receipt.logs {
			if log.topics.first() != Some(&transfer.signature()) {
				continue;
			}
			let raw = RawLog { topics: log.topics.clone(), data: log.data.to_vec() };
			let parsed = transfer
				.parse_log(raw)
				.map_err(|e| ChainError::InvalidReceipt { message: e.to_string(), hash: Some(tx_hash.to_string()) })?;
			let to = parsed.params.iter().find(|p| p.name == "to").and_then(|p| p.value.clone().into_address());
			let value = parsed.params.iter().find(|p| p.name == "value").and_then(|p| p.value.clone().into_uint());
			if let (Some(to), Some(value)) = (to, value) {
				if to == expected_to && value.as_u128() >= min_amount.0 {
					return Ok(true);
				}
			}
		}
		Ok(false)
	}

	async fn latest_block_number(&self) -> Result<u64> {
		self.payer.get_block_number().await.map(|n| n.as_u64()).map_err(|e| ChainError::Network(e.to_string()))
	}

	async fn get_bounty_released_events(&self, from_block: u64, to_block: u64) -> Result<Vec<BountyReleasedEvent>> {
		let event = abi::bounty_pool()
			.event("BountyReleased")
			.map_err(|e| ChainError::Network(format!("abi missing event BountyReleased: {e}")))?;
		let filter = Filter::new()
			.address(self.bounty_pool.address())
			.topic0(event.signature())
			.from_block(from_block)
			.to_block(to_block);
		let logs = self
			.payer
			.get_logs(&filter)
			.await
			.map_err(|e| ChainError::Network(format!("fetching BountyReleased logs {from_block}..={to_block}: {e}")))?;
		logs.into_iter().map(|log| decode_bounty_released(event, log)).collect()
	}
}

fn decode_bounty_released(event: &ethers::abi::Event, log: Log) -> Result<BountyReleasedEvent> {
	let block_number =
		log.block_number.ok_or_else(|| ChainError::InvalidReceipt { message: "log missing block number".into(), hash: None })?.as_u64();
	let tx_hash = log
		.transaction_hash
		.ok_or_else(|| ChainError::InvalidReceipt { message: "log missing transaction hash".into(), hash: None })?;
	let log_index =
		log.log_index.ok_or_else(|| ChainError::InvalidReceipt { message: "log missing log index".into(), hash: None })?.as_u64();

	let raw = RawLog { topics: log.topics.clone(), data: log.data.to_vec() };
	let parsed = event
		.parse_log(raw)
		.map_err(|e| ChainError::InvalidReceipt { message: e.to_string(), hash: Some(format!("{tx_hash:#x}")) })?;

	let param = |name: &str| -> Result<ethers::abi::Token> {
		parsed
			.params
			.iter()
			.find(|p| p.name == name)
			.map(|p| p.value.clone())
			.ok_or_else(|| ChainError::InvalidReceipt {
				message: format!("BountyReleased missing {name}"),
				hash: Some(format!("{tx_hash:#x}")),
			})
	};
	let bad_token = || ChainError::InvalidReceipt { message: "BountyReleased has an unexpected token type".into(), hash: Some(format!("{tx_hash:#x}")) };

	let researcher = param("researcher")?.into_address().ok_or_else(bad_token)?;
	let amount = param("amount")?.into_uint().ok_or_else(bad_token)?;
	let severity = param("severity")?.into_uint().ok_or_else(bad_token)?.as_u32() as u8;

	Ok(BountyReleasedEvent {
		protocol_id: token_u64(param("protocolId")?)?,
		bounty_id: token_u64(param("bountyId")?)?,
		validation_id: token_u64(param("validationId")?)?,
		researcher: format!("{researcher:#x}"),
		amount: Wei(amount.as_u128()),
		severity,
		block_number,
		tx_hash: format!("{tx_hash:#x}"),
		log_index,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_malformed_address_without_touching_the_network() {
		assert!(matches!(parse_address("not-an-address"), Err(ChainError::Revert { .. })));
	}

	#[test]
	fn accepts_well_formed_checksum_address() {
		assert!(parse_address("0x0000000000000000000000000000000000000001").is_ok());
	}

	#[test]
	fn classifies_insufficient_funds_as_insufficient_balance() {
		let err = classify_send_error("releaseBounty", "execution reverted: insufficient funds for transfer");
		assert!(matches!(err, ChainError::InsufficientBalance { .. }));
	}

	#[test]
	fn classifies_unrecognized_provider_errors_as_network() {
		let err = classify_send_error("releaseBounty", "connection refused");
		assert!(matches!(err, ChainError::Network(_)));
	}

	#[tokio::test]
	#[ignore = "requires a live node endpoint and funded keys"]
	async fn smoke_test_against_a_real_node() {
		let settings = ChainSettings {
			http_node_endpoint: std::env::var("BOUNTY_TEST_RPC_URL").unwrap(),
			payer_private_key_file: std::env::var("BOUNTY_TEST_PAYER_KEY_FILE").unwrap(),
			researcher_private_key_file: None,
			protocol_registry_address: "0x0000000000000000000000000000000000000001".into(),
			bounty_pool_address: "0x0000000000000000000000000000000000000002".into(),
			validation_registry_address: "0x0000000000000000000000000000000000000003".into(),
			escrow_address: "0x0000000000000000000000000000000000000004".into(),
			agent_identity_address: "0x0000000000000000000000000000000000000005".into(),
			fee_token_address: "0x0000000000000000000000000000000000000006".into(),
			reconciler_from_block: 0,
			reconciler_poll_interval_ms: 4_000,
		};
		let client = EthersChainClient::new(&settings).await.unwrap();
		let balance = client.get_protocol_balance(1).await.unwrap();
		println!("{balance:?}");
	}
}
