//! Single-owner actor for the shared AccountState.
//!
//! Pair workers never mutate the account in place. They send commands over
//! an `mpsc` channel to one owner thread, which applies the bookkeeping
//! rules in arrival order and replies through a per-command channel. That
//! serializes every read-modify-write across pairs without locks.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};

use crate::domain::account::{AccountState, PortfolioLimits};
use crate::domain::decision::RiskDecision;
use crate::domain::trade::{ClosedTrade, ExitReason};
use crate::error::EngineError;

/// Commands accepted by the account owner.
#[derive(Debug)]
pub enum AccountCommand {
    /// Read-only ceiling check for a proposal, before any order goes out.
    Admit {
        decision: RiskDecision,
        reply: Sender<AccountReply>,
    },
    /// Apply an execution fill: re-admit and open atomically.
    Open {
        decision: RiskDecision,
        fill_price: f64,
        fee: f64,
        filled_at: DateTime<Utc>,
        reply: Sender<AccountReply>,
    },
    TakeProfit {
        pair: String,
        level_index: usize,
        fill_price: f64,
        fee: f64,
        at: DateTime<Utc>,
        reply: Sender<AccountReply>,
    },
    Close {
        pair: String,
        fill_price: f64,
        fee: f64,
        at: DateTime<Utc>,
        reason: ExitReason,
        reply: Sender<AccountReply>,
    },
    /// Offer a tighter stop for an open position.
    Ratchet {
        pair: String,
        candidate: f64,
        reply: Sender<AccountReply>,
    },
    Query {
        reply: Sender<AccountReply>,
    },
    Shutdown,
}

#[derive(Debug)]
pub enum AccountReply {
    Accepted,
    Rejected(EngineError),
    Trade(Box<ClosedTrade>),
    StopMoved(bool),
    State(Box<AccountState>),
}

/// Spawn the owner thread and hand back its command side.
pub fn spawn_account_owner(
    account: AccountState,
    limits: PortfolioLimits,
) -> (AccountHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel();
    let handle = thread::Builder::new()
        .name("tradewind-account".into())
        .spawn(move || {
            owner_loop(account, limits, rx);
        })
        .expect("failed to spawn account owner thread");
    (AccountHandle { tx }, handle)
}

fn owner_loop(mut account: AccountState, limits: PortfolioLimits, rx: Receiver<AccountCommand>) {
    loop {
        match rx.recv() {
            Ok(AccountCommand::Shutdown) | Err(_) => break,
            Ok(cmd) => handle_command(cmd, &mut account, &limits),
        }
    }
}

fn handle_command(cmd: AccountCommand, account: &mut AccountState, limits: &PortfolioLimits) {
    match cmd {
        AccountCommand::Admit { decision, reply } => {
            let response = match account.admit(&decision, limits) {
                Ok(()) => AccountReply::Accepted,
                Err(e) => AccountReply::Rejected(e),
            };
            let _ = reply.send(response);
        }
        AccountCommand::Open { decision, fill_price, fee, filled_at, reply } => {
            let response = match account.open_position(&decision, limits, fill_price, fee, filled_at)
            {
                Ok(()) => AccountReply::Accepted,
                Err(e) => AccountReply::Rejected(e),
            };
            let _ = reply.send(response);
        }
        AccountCommand::TakeProfit { pair, level_index, fill_price, fee, at, reply } => {
            let response = match account.fill_take_profit(&pair, level_index, fill_price, fee, at) {
                Ok(trade) => AccountReply::Trade(Box::new(trade)),
                Err(e) => AccountReply::Rejected(e),
            };
            let _ = reply.send(response);
        }
        AccountCommand::Close { pair, fill_price, fee, at, reason, reply } => {
            let response = match account.close_position(&pair, fill_price, fee, at, reason) {
                Ok(trade) => AccountReply::Trade(Box::new(trade)),
                Err(e) => AccountReply::Rejected(e),
            };
            let _ = reply.send(response);
        }
        AccountCommand::Ratchet { pair, candidate, reply } => {
            let moved = account
                .open_positions
                .get_mut(&pair)
                .map(|p| p.ratchet_stop(candidate))
                .unwrap_or(false);
            let _ = reply.send(AccountReply::StopMoved(moved));
        }
        AccountCommand::Query { reply } => {
            let _ = reply.send(AccountReply::State(Box::new(account.clone())));
        }
        AccountCommand::Shutdown => {} // handled in loop
    }
}

/// Cheap, clonable front door to the account owner.
///
/// Each call opens a private reply channel, so concurrent callers never
/// see each other's responses.
#[derive(Debug, Clone)]
pub struct AccountHandle {
    tx: Sender<AccountCommand>,
}

impl AccountHandle {
    pub fn admit(&self, decision: RiskDecision) -> Result<(), EngineError> {
        let (reply, rx) = mpsc::channel();
        self.send(AccountCommand::Admit { decision, reply })?;
        match self.receive(&rx)? {
            AccountReply::Accepted => Ok(()),
            AccountReply::Rejected(e) => Err(e),
            other => Err(unexpected(other)),
        }
    }

    pub fn open(
        &self,
        decision: RiskDecision,
        fill_price: f64,
        fee: f64,
        filled_at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let (reply, rx) = mpsc::channel();
        self.send(AccountCommand::Open { decision, fill_price, fee, filled_at, reply })?;
        match self.receive(&rx)? {
            AccountReply::Accepted => Ok(()),
            AccountReply::Rejected(e) => Err(e),
            other => Err(unexpected(other)),
        }
    }

    pub fn take_profit(
        &self,
        pair: &str,
        level_index: usize,
        fill_price: f64,
        fee: f64,
        at: DateTime<Utc>,
    ) -> Result<ClosedTrade, EngineError> {
        let (reply, rx) = mpsc::channel();
        self.send(AccountCommand::TakeProfit {
            pair: pair.to_string(),
            level_index,
            fill_price,
            fee,
            at,
            reply,
        })?;
        match self.receive(&rx)? {
            AccountReply::Trade(trade) => Ok(*trade),
            AccountReply::Rejected(e) => Err(e),
            other => Err(unexpected(other)),
        }
    }

    pub fn close(
        &self,
        pair: &str,
        fill_price: f64,
        fee: f64,
        at: DateTime<Utc>,
        reason: ExitReason,
    ) -> Result<ClosedTrade, EngineError> {
        let (reply, rx) = mpsc::channel();
        self.send(AccountCommand::Close {
            pair: pair.to_string(),
            fill_price,
            fee,
            at,
            reason,
            reply,
        })?;
        match self.receive(&rx)? {
            AccountReply::Trade(trade) => Ok(*trade),
            AccountReply::Rejected(e) => Err(e),
            other => Err(unexpected(other)),
        }
    }

    /// Offer a tighter stop; true if the position actually moved it.
    pub fn ratchet(&self, pair: &str, candidate: f64) -> Result<bool, EngineError> {
        let (reply, rx) = mpsc::channel();
        self.send(AccountCommand::Ratchet {
            pair: pair.to_string(),
            candidate,
            reply,
        })?;
        match self.receive(&rx)? {
            AccountReply::StopMoved(moved) => Ok(moved),
            AccountReply::Rejected(e) => Err(e),
            other => Err(unexpected(other)),
        }
    }

    pub fn state(&self) -> Result<AccountState, EngineError> {
        let (reply, rx) = mpsc::channel();
        self.send(AccountCommand::Query { reply })?;
        match self.receive(&rx)? {
            AccountReply::State(state) => Ok(*state),
            other => Err(unexpected(other)),
        }
    }

    /// Ask the owner to exit. Safe to call with the owner already gone.
    pub fn shutdown(&self) {
        let _ = self.tx.send(AccountCommand::Shutdown);
    }

    fn send(&self, cmd: AccountCommand) -> Result<(), EngineError> {
        self.tx
            .send(cmd)
            .map_err(|_| EngineError::ExecutionFailure("account owner is gone".to_string()))
    }

    fn receive(&self, rx: &Receiver<AccountReply>) -> Result<AccountReply, EngineError> {
        rx.recv()
            .map_err(|_| EngineError::ExecutionFailure("account owner dropped reply".to_string()))
    }
}

fn unexpected(reply: AccountReply) -> EngineError {
    EngineError::ExecutionFailure(format!("unexpected account reply: {reply:?}"))
}
