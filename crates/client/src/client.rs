// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{
    ClientError, ClientState, ClientView, DecryptResults, GetClientView, OpOutcome,
    ProviderChanged, Reconnect, Refresh, SessionStatus, SubmitTemperature, SubscribeView,
};
use actix::prelude::*;
use alloy::primitives::{Address, U256};
use anyhow::Result;
use futures::{future::BoxFuture, FutureExt, Stream};
use std::{collections::HashMap, sync::Arc};
use thermo_config::AppConfig;
use thermo_evm::{
    tenths_to_celsius, BindingResolver, CiphertextHandle, HandleContractPair, ProviderContext,
    TemperatureCheckApi,
};
use thermo_relayer::{
    unix_now, CoprocessorError, DecryptionSignature, Session, SessionManager, SignatureCache,
    SignatureKey,
};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

type Signed = Result<(DecryptionSignature, bool), ClientError>;

/// Turn a watch channel of provider contexts into a stream that starts with the current value.
fn provider_stream(
    rx: watch::Receiver<Option<ProviderContext>>,
) -> impl Stream<Item = ProviderChanged> {
    futures::stream::unfold((rx, true), |(mut rx, first)| async move {
        if !first {
            rx.changed().await.ok()?;
        }
        let context = rx.borrow_and_update().clone();
        Some((ProviderChanged(context), (rx, false)))
    })
}

/// Orchestrates the confidential temperature flow for the connected wallet: resolves the
/// contract binding, keeps a coprocessor session, reads handles, drives decryption and
/// submissions, and publishes a [`ClientView`] after every transition.
///
/// Every context change bumps `generation`; async work captures it at start and its result is
/// dropped if it no longer matches when the work completes.
pub struct ThermoClient {
    resolver: BindingResolver,
    sessions: SessionManager,
    duration_days: u64,
    provider_updates: Option<watch::Receiver<Option<ProviderContext>>>,
    context: Option<ProviderContext>,
    contract: Option<Arc<dyn TemperatureCheckApi>>,
    session: Option<Arc<Session>>,
    signatures: SignatureCache,
    generation: u64,
    refresh_queued: bool,
    state: ClientState,
    view: watch::Sender<ClientView>,
}

impl ThermoClient {
    pub fn new(resolver: BindingResolver, sessions: SessionManager, duration_days: u64) -> Self {
        let (view, _) = watch::channel(ClientView::default());
        Self {
            resolver,
            sessions,
            duration_days,
            provider_updates: None,
            context: None,
            contract: None,
            session: None,
            signatures: SignatureCache::new(),
            generation: 0,
            refresh_queued: false,
            state: ClientState::default(),
            view,
        }
    }

    pub fn from_config(config: &AppConfig, sessions: SessionManager) -> Result<Self> {
        Ok(Self::new(
            BindingResolver::from_config(config)?,
            sessions,
            config.decryption().duration_days,
        ))
    }

    /// Follow provider changes published on `rx`, starting with its current value.
    pub fn with_provider_updates(mut self, rx: watch::Receiver<Option<ProviderContext>>) -> Self {
        self.provider_updates = Some(rx);
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<ClientView> {
        self.view.subscribe()
    }

    fn view(&self) -> ClientView {
        ClientView::new(&self.state, self.generation)
    }

    fn publish(&self) {
        self.view.send_replace(self.view());
    }

    fn set_message(&mut self, message: impl Into<String>) {
        self.state.message = Some(message.into());
    }

    fn fail(&mut self, error: ClientError) -> OpOutcome {
        match &error {
            ClientError::UserRejectedSignature => info!("User rejected the decryption signature"),
            _ => warn!(error = %error, "Operation failed"),
        }
        self.set_message(error.to_string());
        OpOutcome::Failed(error)
    }

    fn is_stale(&self, generation: u64, operation: &str) -> bool {
        if self.generation == generation {
            return false;
        }
        debug!(
            operation,
            started = generation,
            current = self.generation,
            error = %ClientError::StaleResultDiscarded,
            "Dropping result"
        );
        true
    }

    fn on_provider_changed(&mut self, next: Option<ProviderContext>, ctx: &mut Context<Self>) {
        match (&self.context, &next) {
            (None, None) => return,
            (Some(current), Some(next)) if current == next => {
                trace!(provider = %next.provider_id, "Provider context unchanged");
                return;
            }
            (Some(current), Some(next))
                if current.session_identity() == next.session_identity() =>
            {
                let previous = current.account();
                self.switch_account(previous, next.clone(), ctx);
                return;
            }
            _ => (),
        }

        self.generation += 1;
        if let Some(previous) = self.context.take() {
            self.sessions.invalidate(previous.session_identity());
            if next.as_ref().map(|n| n.account()) != Some(previous.account()) {
                self.signatures.evict_user(previous.account());
            }
        }
        self.session = None;
        self.contract = None;
        self.refresh_queued = false;
        self.state = ClientState::default();

        let Some(next) = next else {
            info!(generation = self.generation, "Wallet disconnected");
            self.set_message("Wallet disconnected");
            self.publish();
            return;
        };

        info!(
            provider = %next.provider_id,
            chain_id = next.chain_id,
            account = %next.account(),
            generation = self.generation,
            "Provider connected"
        );
        self.context = Some(next.clone());
        self.state.chain_id = Some(next.chain_id);
        self.state.account = Some(next.account());

        let binding = self.resolver.resolve(next.chain_id);
        self.state.is_mock_chain = binding.is_mock_chain;
        let Some(address) = binding.contract_address else {
            let error = ClientError::BindingAbsent(next.chain_id);
            info!(chain_id = next.chain_id, "{error}");
            self.set_message(error.to_string());
            self.publish();
            return;
        };

        self.state.is_deployed = true;
        self.state.contract_address = Some(address);
        self.contract = Some(next.contracts.temperature_check(address));
        self.start_session(ctx);
    }

    fn switch_account(
        &mut self,
        previous: Address,
        next: ProviderContext,
        ctx: &mut Context<Self>,
    ) {
        self.generation += 1;
        let evicted = self.signatures.evict_user(previous);
        info!(
            from = %previous,
            to = %next.account(),
            evicted,
            generation = self.generation,
            "Account changed"
        );

        if let Some(address) = self.state.contract_address {
            self.contract = Some(next.contracts.temperature_check(address));
        }
        self.state.account = Some(next.account());
        self.context = Some(next);
        self.refresh_queued = false;
        self.state.reset_readings();
        self.set_message("Account changed");

        match self.state.session_status {
            // The handshake is keyed by provider and chain only; joining it again is free.
            SessionStatus::Connecting => self.start_session(ctx),
            _ => {
                self.publish();
                self.auto_refresh(ctx);
            }
        }
    }

    fn start_session(&mut self, ctx: &mut Context<Self>) {
        let Some(context) = self.context.clone() else {
            return;
        };
        let generation = self.generation;
        self.state.session_status = SessionStatus::Connecting;
        self.set_message("Connecting to FHE coprocessor...");
        self.publish();

        ctx.spawn(self.sessions.create(&context).into_actor(self).map(
            move |result, act, ctx| {
                if act.is_stale(generation, "session") {
                    return;
                }
                match result {
                    Ok(session) => {
                        info!(chain_id = session.chain_id(), "FHE coprocessor session ready");
                        act.session = Some(session);
                        act.state.session_status = SessionStatus::Ready;
                        act.set_message("FHE coprocessor connected");
                        act.publish();
                        act.auto_refresh(ctx);
                    }
                    Err(e) => {
                        act.state.session_status = SessionStatus::Disconnected;
                        act.fail(e.into());
                        act.publish();
                    }
                }
            },
        ));
    }

    fn auto_refresh(&mut self, ctx: &mut Context<Self>) {
        if self.state.is_deployed && self.state.session_ready() {
            ctx.notify(Refresh);
        }
    }

    fn apply_decryption(
        &mut self,
        generation: u64,
        snapshot: (CiphertextHandle, CiphertextHandle),
        key: SignatureKey,
        result: Result<HashMap<CiphertextHandle, U256>, CoprocessorError>,
    ) -> OpOutcome {
        if self.is_stale(generation, "decrypt") {
            return OpOutcome::Discarded;
        }
        self.state.is_decrypting = false;

        let outcome = match result {
            Err(e) => {
                if matches!(e, CoprocessorError::Decryption(_)) {
                    self.signatures.evict(&key);
                    debug!(user = %key.user, "Evicted decryption signature after rejection");
                }
                self.fail(e.into())
            }
            Ok(_) if self.state.handles() != snapshot => {
                debug!(
                    error = %ClientError::StaleResultDiscarded,
                    "Handles changed while decrypting"
                );
                self.summarize_refresh(true);
                OpOutcome::Discarded
            }
            Ok(plaintexts) => match self.store_plaintexts(snapshot, &plaintexts) {
                Ok(()) => {
                    info!(
                        temperature = ?self.state.clear_temperature,
                        fever = ?self.state.clear_fever_result,
                        "Decryption complete"
                    );
                    self.set_message("Decryption complete");
                    OpOutcome::Completed
                }
                Err(e) => self.fail(e),
            },
        };
        self.publish();
        outcome
    }

    /// Both values are validated before either is written.
    fn store_plaintexts(
        &mut self,
        (temperature, fever): (CiphertextHandle, CiphertextHandle),
        plaintexts: &HashMap<CiphertextHandle, U256>,
    ) -> Result<(), ClientError> {
        let clear_temperature = match plaintexts.get(&temperature) {
            Some(value) => {
                let tenths = u32::try_from(*value).map_err(|_| {
                    ClientError::Decryption(format!("Temperature {value} is out of range"))
                })?;
                Some(tenths_to_celsius(tenths))
            }
            None => None,
        };
        let clear_fever = plaintexts.get(&fever).map(|value| !value.is_zero());

        if let Some(value) = clear_temperature {
            self.state.clear_temperature = Some(value);
        }
        if let Some(value) = clear_fever {
            self.state.clear_fever_result = Some(value);
        }
        Ok(())
    }

    fn summarize_refresh(&mut self, changed: bool) {
        let message = if !self.state.has_data() {
            "No temperature submitted yet"
        } else if self.state.is_decrypted() {
            "Temperature is up to date"
        } else if changed {
            "New encrypted temperature available"
        } else {
            "Encrypted temperature available"
        };
        self.set_message(message);
    }
}

impl Actor for ThermoClient {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        debug!("ThermoClient started");
        if let Some(rx) = self.provider_updates.take() {
            ctx.add_stream(provider_stream(rx));
        }
        self.publish();
    }
}

impl StreamHandler<ProviderChanged> for ThermoClient {
    fn handle(&mut self, msg: ProviderChanged, ctx: &mut Self::Context) {
        self.on_provider_changed(msg.0, ctx);
    }

    fn finished(&mut self, _ctx: &mut Self::Context) {
        debug!("Provider updates closed");
    }
}

impl Handler<ProviderChanged> for ThermoClient {
    type Result = ();

    fn handle(&mut self, msg: ProviderChanged, ctx: &mut Self::Context) -> Self::Result {
        self.on_provider_changed(msg.0, ctx);
    }
}

impl Handler<Reconnect> for ThermoClient {
    type Result = ();

    fn handle(&mut self, _: Reconnect, ctx: &mut Self::Context) -> Self::Result {
        if self.state.is_deployed && self.state.session_status == SessionStatus::Disconnected {
            self.start_session(ctx);
        }
    }
}

impl Handler<Refresh> for ThermoClient {
    type Result = ResponseActFuture<Self, OpOutcome>;

    fn handle(&mut self, _: Refresh, _: &mut Self::Context) -> Self::Result {
        if !self.state.can_get_temperature() {
            trace!(refreshing = self.state.is_refreshing, "Refresh not allowed");
            return Box::pin(fut::ready(OpOutcome::Skipped));
        }
        let (Some(contract), Some(account)) = (self.contract.clone(), self.state.account) else {
            return Box::pin(fut::ready(OpOutcome::Skipped));
        };

        let generation = self.generation;
        self.state.is_refreshing = true;
        self.publish();

        let reads = async move {
            futures::try_join!(
                contract.get_temperature_handle(account),
                contract.get_fever_handle(account)
            )
        };

        Box::pin(reads.into_actor(self).map(move |result, act, ctx| {
            if act.is_stale(generation, "refresh") {
                return OpOutcome::Discarded;
            }
            act.state.is_refreshing = false;

            let outcome = match result {
                Ok((temperature, fever)) => {
                    let changed = act.state.set_handles(temperature, fever);
                    debug!(%temperature, %fever, changed, "Handles refreshed");
                    act.summarize_refresh(changed);
                    OpOutcome::Completed
                }
                Err(e) => act.fail(ClientError::Transport(format!("{e:#}"))),
            };
            act.publish();

            if std::mem::take(&mut act.refresh_queued) {
                ctx.notify(Refresh);
            }
            outcome
        }))
    }
}

impl Handler<DecryptResults> for ThermoClient {
    type Result = ResponseActFuture<Self, OpOutcome>;

    fn handle(&mut self, _: DecryptResults, _: &mut Self::Context) -> Self::Result {
        if !self.state.can_decrypt() {
            trace!(decrypting = self.state.is_decrypting, "Decrypt not allowed");
            return Box::pin(fut::ready(OpOutcome::Skipped));
        }
        let (Some(context), Some(session), Some(contract_address)) = (
            self.context.clone(),
            self.session.clone(),
            self.state.contract_address,
        ) else {
            return Box::pin(fut::ready(OpOutcome::Skipped));
        };

        let generation = self.generation;
        let snapshot = self.state.handles();
        let pairs: Vec<HandleContractPair> = self
            .state
            .pending_handles()
            .into_iter()
            .map(|handle| HandleContractPair {
                handle,
                contract_address,
            })
            .collect();
        let account = context.account();
        let contracts = [contract_address];
        let fingerprint = session.keypair().fingerprint();
        let now = unix_now();

        self.state.is_decrypting = true;

        // Checked and decided without suspending.
        let signing: BoxFuture<'static, Signed> =
            match self.signatures.get(account, &contracts, fingerprint, now) {
                Some(signature) => {
                    debug!(user = %account, "Reusing cached decryption signature");
                    self.set_message("Decrypting...");
                    futures::future::ready(Ok((signature, false))).boxed()
                }
                None => {
                    self.state.awaiting_signature = true;
                    self.set_message("Waiting for decryption signature...");
                    let authorization = session.authorization(&contracts, now, self.duration_days);
                    let wallet = context.wallet.clone();
                    async move {
                        let bytes = wallet.sign_typed_data(&authorization).await?;
                        let signature =
                            DecryptionSignature::new(account, &authorization, fingerprint, bytes);
                        Ok::<_, ClientError>((signature, true))
                    }
                    .boxed()
                }
            };
        self.publish();

        Box::pin(signing.into_actor(self).then(
            move |signed, act, _| -> ResponseActFuture<Self, OpOutcome> {
                if act.is_stale(generation, "decryption signature") {
                    return Box::pin(fut::ready(OpOutcome::Discarded));
                }
                act.state.awaiting_signature = false;

                let (signature, fresh) = match signed {
                    Ok(signed) => signed,
                    Err(e) => {
                        act.state.is_decrypting = false;
                        let outcome = act.fail(e);
                        act.publish();
                        return Box::pin(fut::ready(outcome));
                    }
                };
                if fresh {
                    debug!(user = %account, valid_until = signature.valid_until, "Caching decryption signature");
                    act.signatures.put(signature.clone());
                }
                if act.state.handles() != snapshot {
                    debug!(
                        error = %ClientError::StaleResultDiscarded,
                        "Handles changed while waiting for the signature"
                    );
                    act.state.is_decrypting = false;
                    act.summarize_refresh(true);
                    act.publish();
                    return Box::pin(fut::ready(OpOutcome::Discarded));
                }
                act.set_message("Decrypting...");
                act.publish();

                let key = signature.key();
                let coprocessor = session.coprocessor();
                let decrypt = async move { coprocessor.decrypt(&pairs, &signature).await };
                Box::pin(decrypt.into_actor(act).map(move |result, act, _| {
                    act.apply_decryption(generation, snapshot, key, result)
                }))
            },
        ))
    }
}

impl Handler<SubmitTemperature> for ThermoClient {
    type Result = ResponseActFuture<Self, OpOutcome>;

    fn handle(&mut self, msg: SubmitTemperature, _: &mut Self::Context) -> Self::Result {
        if !self.state.can_submit() {
            return Box::pin(fut::ready(OpOutcome::Skipped));
        }
        let (Some(session), Some(contract), Some(account)) =
            (self.session.clone(), self.contract.clone(), self.state.account)
        else {
            return Box::pin(fut::ready(OpOutcome::Skipped));
        };

        let generation = self.generation;
        self.state.is_submitting = true;
        self.set_message("Encrypting temperature...");
        self.publish();

        let tenths = msg.tenths;
        let coprocessor = session.coprocessor();
        let submit = async move {
            let input = coprocessor
                .encrypt(tenths, contract.address(), account)
                .await?;
            contract
                .submit_temperature(account, input)
                .await
                .map_err(|e| ClientError::Transport(format!("{e:#}")))
        };

        Box::pin(submit.into_actor(self).map(move |result, act, ctx| {
            if act.is_stale(generation, "submit") {
                return OpOutcome::Discarded;
            }
            act.state.is_submitting = false;

            let outcome = match result {
                Ok(receipt) => {
                    info!(tenths, tx = %receipt.transaction_hash, "Temperature submitted");
                    act.set_message(format!(
                        "Temperature submitted in transaction {}",
                        receipt.transaction_hash
                    ));
                    if act.state.is_refreshing {
                        act.refresh_queued = true;
                    } else {
                        ctx.notify(Refresh);
                    }
                    OpOutcome::Completed
                }
                Err(e) => act.fail(e),
            };
            act.publish();
            outcome
        }))
    }
}

impl Handler<GetClientView> for ThermoClient {
    type Result = MessageResult<GetClientView>;

    fn handle(&mut self, _: GetClientView, _: &mut Self::Context) -> Self::Result {
        MessageResult(self.view())
    }
}

impl Handler<SubscribeView> for ThermoClient {
    type Result = MessageResult<SubscribeView>;

    fn handle(&mut self, _: SubscribeView, _: &mut Self::Context) -> Self::Result {
        MessageResult(self.subscribe())
    }
}
