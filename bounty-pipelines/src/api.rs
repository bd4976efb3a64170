//! The §6 external interface surface: one async trait per bullet, each
//! implemented on [`CoreApi`], a thin wrapper around [`PipelineContext`].
//! `ReconciliationApi` is not here - the reconciliation read paths live next
//! to the writer that produces them, in `bounty-reconciler`.

use std::{pin::Pin, time::Duration};

use async_trait::async_trait;
use bounty_bus::{topic, BusEvent};
use bounty_primitives::{
    agent::{AgentFeedback, AgentReputation, FeedbackType},
    escrow::{Escrow, EscrowTransaction, EscrowTransactionKind},
    fee_request::{FeeChallenge, FeeRequest, FeeRequestStatus, FeeRequestType},
    finding::{Finding, FindingStatus},
    ids::{AgentIdentityId, FeeRequestId, FindingId, PaymentId, ProofId, ProtocolId, ScanId},
    payment::{Payment, PaymentStatus},
    proof::{Proof, ProofStatus},
    protocol::{Protocol, ProtocolRegistrationInput, ProtocolStatus},
    scan::{Scan, ScanState},
    validation::Validation,
    CoreError, Wei,
};
use bounty_queue::EnqueueOptions;
use bounty_store::StoreError;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use crate::{context::PipelineContext, jobs};

pub type EventStream = Pin<Box<dyn futures::Stream<Item = BusEvent> + Send>>;

fn stream_topic(ctx: &PipelineContext, topic: String) -> EventStream {
    let rx = ctx.bus.subscribe(&topic);
    Box::pin(BroadcastStream::new(rx).filter_map(|item| async move { item.ok() }))
}

const READ_CACHE_TTL: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------
// Scans
// ---------------------------------------------------------------------

#[async_trait]
pub trait ScansApi: Send + Sync {
    async fn create(&self, protocol_id: ProtocolId, branch: Option<String>, commit: Option<String>) -> Result<Scan, CoreError>;
    async fn get(&self, scan_id: ScanId) -> Result<Scan, CoreError>;
    async fn list(&self, protocol_id: ProtocolId) -> Result<Vec<Scan>, CoreError>;
    async fn cancel(&self, scan_id: ScanId) -> Result<(), CoreError>;
    fn subscribe_progress(&self, scan_id: ScanId) -> EventStream;
    fn subscribe_logs(&self, scan_id: ScanId) -> EventStream;
}

// ---------------------------------------------------------------------
// Protocols
// ---------------------------------------------------------------------

/// Either side of the x402 fee gate: a still-unpaid registration gets a
/// challenge back, a paid or fee-exempt one gets the created protocol.
#[derive(Debug, Clone)]
pub enum RegisterOutcome {
    PaymentRequired(FeeChallenge),
    Accepted(Protocol),
}

/// A settled transfer the caller claims satisfies a [`FeeChallenge`] - the
/// raw-hash fallback path from §6 (the facilitator-receipt path is out of
/// scope here; this crate's boundary only verifies on-chain transfers).
#[derive(Debug, Clone)]
pub struct FeePayment {
    pub tx_hash: String,
}

#[async_trait]
pub trait ProtocolsApi: Send + Sync {
    async fn register(
        &self,
        owner_id: &str,
        input: ProtocolRegistrationInput,
        payment: Option<FeePayment>,
    ) -> Result<RegisterOutcome, CoreError>;
    async fn get(&self, protocol_id: ProtocolId) -> Result<Protocol, CoreError>;
    async fn list(&self, status: Option<ProtocolStatus>) -> Result<Vec<Protocol>, CoreError>;
    async fn update_status(&self, protocol_id: ProtocolId, status: ProtocolStatus) -> Result<(), CoreError>;
}

// ---------------------------------------------------------------------
// Validations
// ---------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ValidationDetail {
    pub finding: Finding,
    pub proof: Option<Proof>,
    pub validation: Option<Validation>,
}

#[async_trait]
pub trait ValidationsApi: Send + Sync {
    async fn list(&self, scan_id: Option<ScanId>, status: Option<FindingStatus>) -> Result<Vec<Finding>, CoreError>;
    async fn get_detail(&self, finding_id: FindingId) -> Result<ValidationDetail, CoreError>;
    async fn get_active(&self) -> Result<Vec<Proof>, CoreError>;
    fn subscribe_progress(&self, proof_id: ProofId) -> EventStream;
    fn subscribe_logs(&self, proof_id: ProofId) -> EventStream;
    fn subscribe_activity(&self) -> EventStream;
}

// ---------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct PoolStatus {
    pub total_bounty_pool: Wei,
    pub available_bounty: Wei,
    pub paid_bounty: Wei,
}

/// An administrative payment created outside the normal Validator handoff -
/// always carries `admin_override: true`.
#[derive(Debug, Clone)]
pub struct ManualPaymentProposal {
    pub finding_id: FindingId,
    pub researcher_address: String,
    pub amount: Wei,
}

#[async_trait]
pub trait PaymentsApi: Send + Sync {
    async fn list(&self, status: Option<PaymentStatus>, researcher_address: Option<String>) -> Result<Vec<Payment>, CoreError>;
    async fn get_earnings(&self, address: &str, since: DateTime<Utc>) -> Result<Wei, CoreError>;
    async fn leaderboard(&self, since: DateTime<Utc>, limit: u32) -> Result<Vec<(String, Wei)>, CoreError>;
    async fn pool_status(&self, protocol_id: ProtocolId) -> Result<PoolStatus, CoreError>;
    async fn propose_manual(&self, proposal: ManualPaymentProposal) -> Result<Payment, CoreError>;
    async fn retry_failed(&self, payment_id: PaymentId) -> Result<(), CoreError>;
}

// ---------------------------------------------------------------------
// Escrow
// ---------------------------------------------------------------------

#[async_trait]
pub trait EscrowApi: Send + Sync {
    async fn get_balance(&self, address: &str) -> Result<Escrow, CoreError>;
    async fn deposit_for(&self, address: &str, amount: Wei, tx_hash: &str) -> Result<(), CoreError>;
    async fn deduct(&self, address: &str, finding_id: FindingId) -> Result<(), CoreError>;
    async fn transactions(&self, address: &str) -> Result<Vec<EscrowTransaction>, CoreError>;
}

// ---------------------------------------------------------------------
// Reputation
// ---------------------------------------------------------------------

#[async_trait]
pub trait ReputationApi: Send + Sync {
    async fn get_reputation(&self, agent_id: AgentIdentityId) -> Result<AgentReputation, CoreError>;
    async fn get_feedback_history(&self, address: &str) -> Result<Vec<AgentFeedback>, CoreError>;
    async fn record(
        &self,
        researcher_address: &str,
        validator_address: &str,
        validation_id: bounty_primitives::ids::ValidationId,
        finding_id: FindingId,
        feedback_type: FeedbackType,
    ) -> Result<(), CoreError>;
}

// ---------------------------------------------------------------------
// CoreApi: the one struct implementing all of the above
// ---------------------------------------------------------------------

#[derive(Clone)]
pub struct CoreApi {
    ctx: PipelineContext,
}

impl CoreApi {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    async fn resolve_agent(&self, wallet_address: &str) -> Result<AgentIdentityId, CoreError> {
        Ok(self
            .ctx
            .repos
            .agent_identities
            .get_by_wallet(wallet_address)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("agent identity for wallet {wallet_address}")))?
            .id)
    }

    fn fee_challenge(&self, request: &FeeRequest) -> FeeChallenge {
        FeeChallenge {
            scheme: "exact".to_string(),
            price: request.amount,
            network: self.ctx.fee_settings.network.clone(),
            pay_to: self.ctx.fee_settings.pay_to_address.clone(),
            description: format!("{:?} fee for {}", request.request_type, request.requester_address),
        }
    }

    async fn create_protocol(&self, owner_id: &str, input: &ProtocolRegistrationInput) -> Result<Protocol, CoreError> {
        let protocol = Protocol {
            id: ProtocolId::new(),
            owner_id: owner_id.to_string(),
            owner_address: input.owner_address.clone(),
            source_url: input.source_url.clone(),
            branch: input.branch.clone(),
            contract_path: input.contract_path.clone(),
            contract_name: input.contract_name.clone(),
            status: ProtocolStatus::Pending,
            on_chain_id: None,
            total_bounty_pool: Wei::ZERO,
            available_bounty: Wei::ZERO,
            paid_bounty: Wei::ZERO,
            risk_score: None,
            error_message: None,
            created_at: Utc::now(),
        };
        self.ctx.repos.protocols.insert(&protocol).await?;
        self.ctx
            .queue
            .enqueue(
                jobs::PROTOCOL_QUEUE,
                &jobs::protocol_job_id(protocol.id),
                &serde_json::to_value(jobs::ProtocolJobPayload { protocol_id: protocol.id })
                    .expect("ProtocolJobPayload always serializes"),
                EnqueueOptions::default(),
            )
            .await?;
        Ok(protocol)
    }
}

#[async_trait]
impl ScansApi for CoreApi {
    async fn create(&self, protocol_id: ProtocolId, branch: Option<String>, commit: Option<String>) -> Result<Scan, CoreError> {
        let protocol = self.ctx.repos.protocols.get(protocol_id).await?;
        let scan = Scan {
            id: ScanId::new(),
            protocol_id,
            state: ScanState::Queued,
            current_step: "QUEUED".to_string(),
            target_branch: branch.or(Some(protocol.branch)),
            target_commit: commit,
            retry_count: 0,
            tool_status: None,
            started_at: None,
            completed_at: None,
            error_code: None,
            error_message: None,
        };
        self.ctx.repos.scans.insert(&scan).await?;
        self.ctx
            .queue
            .enqueue(
                jobs::SCAN_QUEUE,
                &format!("manual-{}", scan.id),
                &serde_json::to_value(jobs::ScanJobPayload { scan_id: scan.id }).expect("ScanJobPayload always serializes"),
                EnqueueOptions::default(),
            )
            .await?;
        Ok(scan)
    }

    async fn get(&self, scan_id: ScanId) -> Result<Scan, CoreError> {
        Ok(self.ctx.repos.scans.get(scan_id).await?)
    }

    async fn list(&self, protocol_id: ProtocolId) -> Result<Vec<Scan>, CoreError> {
        Ok(self.ctx.repos.scans.list_by_protocol(protocol_id).await?)
    }

    async fn cancel(&self, scan_id: ScanId) -> Result<(), CoreError> {
        Ok(self.ctx.repos.scans.advance(scan_id, ScanState::Canceled, "CANCELED", None).await?)
    }

    fn subscribe_progress(&self, scan_id: ScanId) -> EventStream {
        stream_topic(&self.ctx, topic::scan_progress(&scan_id.to_string()))
    }

    fn subscribe_logs(&self, scan_id: ScanId) -> EventStream {
        stream_topic(&self.ctx, topic::scan_logs(&scan_id.to_string()))
    }
}

#[async_trait]
impl ProtocolsApi for CoreApi {
    async fn register(
        &self,
        owner_id: &str,
        input: ProtocolRegistrationInput,
        payment: Option<FeePayment>,
    ) -> Result<RegisterOutcome, CoreError> {
        if let Some(existing) = self.ctx.repos.protocols.get_by_source_url(&input.source_url).await? {
            return Ok(RegisterOutcome::Accepted(existing));
        }

        let fingerprint = bounty_crypto::fingerprint(
            &input.owner_address,
            &input.source_url,
            &input.branch,
            &input.contract_path,
            &input.contract_name,
        )
        .ok_or_else(|| CoreError::Validation("registration payload has an empty required field".to_string()))?;

        let window_start = Utc::now() - ChronoDuration::seconds(self.ctx.fee_settings.retry_window_secs);
        if self
            .ctx
            .repos
            .fee_requests
            .find_recent_completed_by_fingerprint(&fingerprint, window_start)
            .await?
            .is_some()
        {
            return Ok(RegisterOutcome::Accepted(self.create_protocol(owner_id, &input).await?));
        }

        if let Some(payment) = payment {
            let verified = self
                .ctx
                .chain
                .verify_erc20_transfer(&payment.tx_hash, &self.ctx.fee_settings.pay_to_address, self.ctx.fee_settings.protocol_registration_fee)
                .await?;
            if !verified {
                return Err(CoreError::Validation("fee transfer could not be verified on-chain".to_string()));
            }
            let fee_request = FeeRequest {
                id: FeeRequestId::new(),
                request_type: FeeRequestType::ProtocolRegistration,
                requester_address: input.owner_address.clone(),
                amount: self.ctx.fee_settings.protocol_registration_fee,
                status: FeeRequestStatus::Pending,
                tx_hash: None,
                fingerprint: Some(fingerprint),
                protocol_id: None,
                expires_at: Utc::now() + ChronoDuration::seconds(self.ctx.fee_settings.retry_window_secs),
                completed_at: None,
            };
            self.ctx.repos.fee_requests.insert(&fee_request).await?;
            self.ctx.repos.fee_requests.mark_completed(fee_request.id, &payment.tx_hash).await?;
            return Ok(RegisterOutcome::Accepted(self.create_protocol(owner_id, &input).await?));
        }

        if let Some(active) = self.ctx.repos.fee_requests.find_active_by_fingerprint(&fingerprint).await? {
            return Ok(RegisterOutcome::PaymentRequired(self.fee_challenge(&active)));
        }

        let fee_request = FeeRequest {
            id: FeeRequestId::new(),
            request_type: FeeRequestType::ProtocolRegistration,
            requester_address: input.owner_address.clone(),
            amount: self.ctx.fee_settings.protocol_registration_fee,
            status: FeeRequestStatus::Pending,
            tx_hash: None,
            fingerprint: Some(fingerprint),
            protocol_id: None,
            expires_at: Utc::now() + ChronoDuration::seconds(self.ctx.fee_settings.retry_window_secs),
            completed_at: None,
        };
        self.ctx.repos.fee_requests.insert(&fee_request).await?;
        Ok(RegisterOutcome::PaymentRequired(self.fee_challenge(&fee_request)))
    }

    async fn get(&self, protocol_id: ProtocolId) -> Result<Protocol, CoreError> {
        Ok(self.ctx.repos.protocols.get(protocol_id).await?)
    }

    async fn list(&self, status: Option<ProtocolStatus>) -> Result<Vec<Protocol>, CoreError> {
        Ok(self.ctx.repos.protocols.list(status).await?)
    }

    async fn update_status(&self, protocol_id: ProtocolId, status: ProtocolStatus) -> Result<(), CoreError> {
        Ok(self.ctx.repos.protocols.set_status(protocol_id, status).await?)
    }
}

#[async_trait]
impl ValidationsApi for CoreApi {
    async fn list(&self, scan_id: Option<ScanId>, status: Option<FindingStatus>) -> Result<Vec<Finding>, CoreError> {
        Ok(self.ctx.repos.findings.list(scan_id, status).await?)
    }

    async fn get_detail(&self, finding_id: FindingId) -> Result<ValidationDetail, CoreError> {
        let finding = self.ctx.repos.findings.get(finding_id).await?;
        let proof = match self.ctx.repos.proofs.get_by_finding(finding_id).await {
            Ok(proof) => Some(proof),
            Err(StoreError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };
        let validation = match &proof {
            Some(proof) => self.ctx.repos.validations.get_by_proof(proof.id).await?,
            None => None,
        };
        Ok(ValidationDetail { finding, proof, validation })
    }

    async fn get_active(&self) -> Result<Vec<Proof>, CoreError> {
        Ok(self.ctx.repos.proofs.list_by_status(ProofStatus::Validating).await?)
    }

    fn subscribe_progress(&self, proof_id: ProofId) -> EventStream {
        stream_topic(&self.ctx, topic::validation_progress(&proof_id.to_string()))
    }

    fn subscribe_logs(&self, proof_id: ProofId) -> EventStream {
        stream_topic(&self.ctx, topic::validation_logs(&proof_id.to_string()))
    }

    fn subscribe_activity(&self) -> EventStream {
        stream_topic(&self.ctx, topic::VALIDATION_ACTIVITY.to_string())
    }
}

#[async_trait]
impl PaymentsApi for CoreApi {
    async fn list(&self, status: Option<PaymentStatus>, researcher_address: Option<String>) -> Result<Vec<Payment>, CoreError> {
        Ok(self.ctx.repos.payments.list(status, researcher_address.as_deref()).await?)
    }

    async fn get_earnings(&self, address: &str, since: DateTime<Utc>) -> Result<Wei, CoreError> {
        let cache_key = format!("earnings:{address}:{}", since.timestamp());
        if let Some(cached) = self.ctx.store.cache.get::<Wei>(&cache_key) {
            return Ok(cached);
        }
        let total = self.ctx.repos.earnings_for_address(address, since).await?;
        self.ctx.store.cache.set(cache_key, &total, READ_CACHE_TTL);
        Ok(total)
    }

    async fn leaderboard(&self, since: DateTime<Utc>, limit: u32) -> Result<Vec<(String, Wei)>, CoreError> {
        let cache_key = format!("leaderboard:{}:{limit}", since.timestamp());
        if let Some(cached) = self.ctx.store.cache.get::<Vec<(String, Wei)>>(&cache_key) {
            return Ok(cached);
        }
        let rows = self.ctx.repos.payments.leaderboard(since, limit).await?;
        self.ctx.store.cache.set(cache_key, &rows, READ_CACHE_TTL);
        Ok(rows)
    }

    async fn pool_status(&self, protocol_id: ProtocolId) -> Result<PoolStatus, CoreError> {
        let protocol = self.ctx.repos.protocols.get(protocol_id).await?;
        Ok(PoolStatus {
            total_bounty_pool: protocol.total_bounty_pool,
            available_bounty: protocol.available_bounty,
            paid_bounty: protocol.paid_bounty,
        })
    }

    async fn propose_manual(&self, proposal: ManualPaymentProposal) -> Result<Payment, CoreError> {
        let finding = self.ctx.repos.findings.get(proposal.finding_id).await?;
        let scan = self.ctx.repos.scans.get(finding.scan_id).await?;
        let protocol = self.ctx.repos.protocols.get(scan.protocol_id).await?;

        let payment = Payment {
            id: PaymentId::new(),
            vulnerability_id: proposal.finding_id.to_string(),
            researcher_address: proposal.researcher_address,
            amount: proposal.amount,
            currency: "WEI".to_string(),
            status: PaymentStatus::Pending,
            tx_hash: None,
            on_chain_bounty_id: None,
            failure_reason: None,
            retry_count: 0,
            reconciled: false,
            reconciled_at: None,
            queued_at: Utc::now(),
            processed_at: None,
            paid_at: None,
            admin_override: true,
        };
        self.ctx.repos.create_payment_reserving_bounty(&self.ctx.store, protocol.id, &payment).await?;
        self.ctx
            .queue
            .enqueue(
                jobs::PAYMENT_QUEUE,
                &jobs::payment_job_id(payment.id),
                &serde_json::to_value(jobs::PaymentJobPayload { payment_id: payment.id })
                    .expect("PaymentJobPayload always serializes"),
                EnqueueOptions::default(),
            )
            .await?;
        self.ctx.store.cache.invalidate_prefix("leaderboard:");
        Ok(payment)
    }

    async fn retry_failed(&self, payment_id: PaymentId) -> Result<(), CoreError> {
        let payment = self.ctx.repos.payments.get(payment_id).await?;
        if payment.status != PaymentStatus::Failed {
            return Err(CoreError::Validation(format!("payment {payment_id} is not FAILED")));
        }
        self.ctx.repos.payments.reset_for_retry(payment_id).await?;
        let job_id = jobs::payment_job_id(payment_id);
        self.ctx.queue.remove(jobs::PAYMENT_QUEUE, &job_id).await?;
        self.ctx
            .queue
            .enqueue(
                jobs::PAYMENT_QUEUE,
                &job_id,
                &serde_json::to_value(jobs::PaymentJobPayload { payment_id }).expect("PaymentJobPayload always serializes"),
                EnqueueOptions::default(),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl EscrowApi for CoreApi {
    async fn get_balance(&self, address: &str) -> Result<Escrow, CoreError> {
        let agent_id = self.resolve_agent(address).await?;
        Ok(self.ctx.repos.escrows.get(agent_id).await?)
    }

    async fn deposit_for(&self, address: &str, amount: Wei, tx_hash: &str) -> Result<(), CoreError> {
        let agent_id = self.resolve_agent(address).await?;
        self.ctx.repos.escrows.ensure_row(agent_id).await?;
        let record = EscrowTransaction {
            id: uuid::Uuid::new_v4(),
            escrow_id: agent_id,
            kind: EscrowTransactionKind::Deposit,
            amount,
            tx_hash: Some(tx_hash.to_string()),
            created_at: Utc::now(),
        };
        self.ctx
            .store
            .transaction(|tx| {
                let escrows = self.ctx.repos.escrows.clone();
                let escrow_transactions = self.ctx.repos.escrow_transactions.clone();
                Box::pin(async move {
                    escrows.deposit(tx, agent_id, amount).await?;
                    escrow_transactions.insert(tx, &record).await
                })
            })
            .await?;
        self.ctx.store.cache.invalidate_prefix(&format!("escrow:{address}"));
        Ok(())
    }

    async fn deduct(&self, address: &str, finding_id: FindingId) -> Result<(), CoreError> {
        let agent_id = self.resolve_agent(address).await?;
        let amount = self.ctx.fee_settings.finding_submission_fee;
        let record = EscrowTransaction {
            id: uuid::Uuid::new_v4(),
            escrow_id: agent_id,
            kind: EscrowTransactionKind::SubmissionFee,
            amount,
            tx_hash: None,
            created_at: Utc::now(),
        };
        self.ctx
            .store
            .transaction(|tx| {
                let escrows = self.ctx.repos.escrows.clone();
                let escrow_transactions = self.ctx.repos.escrow_transactions.clone();
                Box::pin(async move {
                    escrows.deduct(tx, agent_id, amount).await?;
                    escrow_transactions.insert(tx, &record).await
                })
            })
            .await?;
        self.ctx.store.cache.invalidate_prefix(&format!("escrow:{address}"));
        tracing::debug!(%finding_id, %address, "deducted submission fee from escrow");
        Ok(())
    }

    async fn transactions(&self, address: &str) -> Result<Vec<EscrowTransaction>, CoreError> {
        let agent_id = self.resolve_agent(address).await?;
        Ok(self.ctx.repos.escrow_transactions.list_for_escrow(agent_id).await?)
    }
}

#[async_trait]
impl ReputationApi for CoreApi {
    async fn get_reputation(&self, agent_id: AgentIdentityId) -> Result<AgentReputation, CoreError> {
        let cache_key = format!("reputation:{agent_id}");
        if let Some(cached) = self.ctx.store.cache.get::<AgentReputation>(&cache_key) {
            return Ok(cached);
        }
        let reputation = self.ctx.repos.agent_reputations.get(agent_id).await?;
        self.ctx.store.cache.set(cache_key, &reputation, READ_CACHE_TTL);
        Ok(reputation)
    }

    async fn get_feedback_history(&self, address: &str) -> Result<Vec<AgentFeedback>, CoreError> {
        let agent_id = self.resolve_agent(address).await?;
        Ok(self.ctx.repos.agent_feedback.list_for_researcher(agent_id).await?)
    }

    async fn record(
        &self,
        researcher_address: &str,
        validator_address: &str,
        validation_id: bounty_primitives::ids::ValidationId,
        finding_id: FindingId,
        feedback_type: FeedbackType,
    ) -> Result<(), CoreError> {
        let researcher_agent_id = self.resolve_agent(researcher_address).await?;
        let validator_agent_id = self.resolve_agent(validator_address).await?;
        self.ctx.repos.agent_reputations.record_outcome(researcher_agent_id, feedback_type).await?;
        let feedback = AgentFeedback {
            id: uuid::Uuid::new_v4(),
            researcher_agent_id,
            validator_agent_id,
            feedback_type,
            on_chain_feedback_id: None,
            finding_id: Some(finding_id),
            validation_id: Some(validation_id),
            created_at: Utc::now(),
        };
        self.ctx.repos.agent_feedback.insert(&feedback).await?;
        self.ctx.store.cache.invalidate_prefix(&format!("reputation:{researcher_agent_id}"));
        Ok(())
    }
}
