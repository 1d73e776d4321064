//! Order pipeline for derivatives exchanges
//!
//! Placing a derivatives order takes several dependent calls: position mode,
//! margin mode and leverage have to be configured before the order goes in.
//! The configuration calls are best effort (the account is often already in
//! the requested state), so their failures are recorded and execution moves
//! on. Sizing is checked against the instrument's lot size before anything
//! is changed on the exchange.

use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::common::errors::{ClientError, Result};
use crate::common::traits::DerivativesClient;
use crate::common::types::{OrderAck, OrderRequest, OrderSize, SymbolInfo};

/// Configuration call run ahead of the order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    PositionMode,
    MarginMode,
    Leverage,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepStatus {
    /// Raw exchange response, whatever its in-band code
    Ok(Value),
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub step: PipelineStep,
    pub status: StepStatus,
}

impl StepReport {
    fn record(step: PipelineStep, result: Result<Value>) -> Self {
        let status = match result {
            Ok(body) => {
                debug!("{:?} -> {}", step, body);
                StepStatus::Ok(body)
            }
            Err(e) => {
                warn!("{:?} failed, continuing: {}", step, e);
                StepStatus::Failed {
                    error: e.to_string(),
                }
            }
        };
        Self { step, status }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.status, StepStatus::Ok(_))
    }
}

/// Everything one pipeline run produced
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Configuration steps in execution order
    pub steps: Vec<StepReport>,
    /// Raw order acknowledgment
    pub order: OrderAck,
    /// Size submitted, in contracts
    pub size: Decimal,
}

impl PipelineOutcome {
    pub fn failed_steps(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| !s.is_ok())
    }
}

/// Convert a quote-currency amount into a contract count.
///
/// `contract_units = amount * leverage / price`; the request is refused when
/// `contract_units / contract_value` is below the lot size. Accepted sizes are
/// floored to a whole number of lots.
pub fn size_in_contracts(
    amount: Decimal,
    leverage: u32,
    price: Decimal,
    info: &SymbolInfo,
) -> Result<Decimal> {
    let contract_units = (amount * Decimal::from(leverage))
        .checked_div(price)
        .ok_or_else(|| ClientError::Validation(format!("no usable price for {}", info.inst_id)))?;
    let contracts = contract_units.checked_div(info.contract_value).ok_or_else(|| {
        ClientError::Validation(format!("{} has zero contract value", info.inst_id))
    })?;
    check_lot_size(contracts, info)
}

/// Refuse sizes below one lot, floor the rest to a lot multiple
pub fn check_lot_size(contracts: Decimal, info: &SymbolInfo) -> Result<Decimal> {
    if contracts < info.lot_size {
        return Err(ClientError::Validation(format!(
            "requested size too small: {} contracts of {} is below lot size {}",
            contracts.normalize(),
            info.inst_id,
            info.lot_size.normalize()
        )));
    }
    let floored = match contracts.checked_div(info.lot_size) {
        Some(lots) => lots.floor() * info.lot_size,
        None => contracts,
    };
    Ok(floored.normalize())
}

/// Runs the configuration calls and the order for one request
#[derive(Clone)]
pub struct OrderPipeline {
    client: Arc<dyn DerivativesClient>,
}

impl OrderPipeline {
    pub fn new(client: Arc<dyn DerivativesClient>) -> Self {
        Self { client }
    }

    /// Size check, then position mode, margin mode, leverage and the order.
    ///
    /// A validation failure aborts before any configuration call. Step
    /// failures are collected into the outcome. An order failure is returned
    /// as the error.
    #[instrument(skip(self, order), fields(inst_id = %order.inst_id, side = %order.side))]
    pub async fn execute(&self, order: &OrderRequest) -> Result<PipelineOutcome> {
        let size = self.resolve_size(order).await?;

        let mut steps = Vec::with_capacity(3);
        steps.push(StepReport::record(
            PipelineStep::PositionMode,
            self.client.set_position_mode(order.position_mode).await,
        ));
        steps.push(StepReport::record(
            PipelineStep::MarginMode,
            self.client
                .set_margin_mode(&order.inst_id, order.margin_mode)
                .await,
        ));
        steps.push(StepReport::record(
            PipelineStep::Leverage,
            self.client
                .set_leverage(
                    &order.inst_id,
                    order.leverage,
                    order.margin_mode,
                    order.position_side,
                )
                .await,
        ));

        let mut sized = order.clone();
        sized.size = OrderSize::Contracts(size);
        let ack = self.client.place_order(&sized).await?;

        info!(
            "Order submitted: {} contracts, code {:?}, {} failed steps",
            size,
            ack.code(),
            steps.iter().filter(|s| !s.is_ok()).count()
        );

        Ok(PipelineOutcome {
            steps,
            order: ack,
            size,
        })
    }

    async fn resolve_size(&self, order: &OrderRequest) -> Result<Decimal> {
        let info = self.client.instrument_info(&order.inst_id).await?;
        match order.size {
            OrderSize::Contracts(contracts) => check_lot_size(contracts, &info),
            OrderSize::Quote(amount) => {
                let price = self.client.last_price(&order.inst_id).await?;
                let size = size_in_contracts(amount, order.leverage, price, &info)?;
                debug!(
                    "{} quote at {} x{} -> {} contracts",
                    amount, price, order.leverage, size
                );
                Ok(size)
            }
        }
    }
}
