use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use procura_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use procura_events::Event;
use procura_invoicing::{InvoiceId, LineType, line_amount};
use procura_parties::{PartyId, PartyPaymentTypes};
use procura_payments::{PaymentTypeId, PaymentTypeRef};

use crate::payment_type::{on_change_party, validate_purchase_payment_type};

/// Stream type for purchase order aggregates.
pub const AGGREGATE_TYPE: &str = "purchasing.order";

/// Purchase order identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseOrderId(pub AggregateId);

impl PurchaseOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PurchaseOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Purchase order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseOrderStatus {
    Draft,
    Approved,
    Invoiced,
}

/// Purchase order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub line_no: u32,
    pub line_type: LineType,
    pub description: String,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
}

/// Aggregate root: PurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    tenant_id: Option<TenantId>,
    party_id: Option<PartyId>,
    payment_type: Option<PaymentTypeId>,
    status: PurchaseOrderStatus,
    lines: Vec<PurchaseLine>,
    invoices: Vec<InvoiceId>,
    version: u64,
    created: bool,
}

impl PurchaseOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PurchaseOrderId) -> Self {
        Self {
            id,
            tenant_id: None,
            party_id: None,
            payment_type: None,
            status: PurchaseOrderStatus::Draft,
            lines: Vec::new(),
            invoices: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PurchaseOrderId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn party_id(&self) -> Option<PartyId> {
        self.party_id
    }

    pub fn payment_type(&self) -> Option<PaymentTypeId> {
        self.payment_type
    }

    pub fn status(&self) -> PurchaseOrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[PurchaseLine] {
        &self.lines
    }

    pub fn invoices(&self) -> &[InvoiceId] {
        &self.invoices
    }

    /// Untaxed total of the lines. `AddLine` keeps it in range, so `None` only
    /// shows up on hand-built state.
    pub fn untaxed_amount(&self) -> Option<Decimal> {
        self.lines.iter().try_fold(Decimal::ZERO, |total, l| {
            total.checked_add(line_amount(l.line_type, l.quantity, l.unit_price)?)
        })
    }

    /// The payment type field is editable only while draft.
    pub fn is_editable(&self) -> bool {
        self.status == PurchaseOrderStatus::Draft
    }
}

impl AggregateRoot for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreatePurchaseOrder.
///
/// `payment_type` is usually the value of
/// [`default_payment_type`](crate::payment_type::default_payment_type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePurchaseOrder {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub party_id: Option<PartyId>,
    pub payment_type: Option<PaymentTypeRef>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddLine (only allowed in Draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLine {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub line_type: LineType,
    pub description: String,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeParty (only allowed in Draft).
///
/// `party_payment_types` is the new party's defaults at the time of the
/// change; the payment type is reset from them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeParty {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub party_id: Option<PartyId>,
    pub party_payment_types: Option<PartyPaymentTypes>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetPaymentType (only allowed in Draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPaymentType {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub payment_type: Option<PaymentTypeRef>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Approve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approve {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordInvoice (an invoice was issued from this order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordInvoice {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderCommand {
    CreatePurchaseOrder(CreatePurchaseOrder),
    AddLine(AddLine),
    ChangeParty(ChangeParty),
    SetPaymentType(SetPaymentType),
    Approve(Approve),
    RecordInvoice(RecordInvoice),
}

/// Event: PurchaseOrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderCreated {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub party_id: Option<PartyId>,
    pub payment_type: Option<PaymentTypeId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderLineAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderLineAdded {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub line: PurchaseLine,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderPartyChanged (carries the recomputed payment type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderPartyChanged {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub party_id: Option<PartyId>,
    pub payment_type: Option<PaymentTypeId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderPaymentTypeSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderPaymentTypeSet {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub payment_type: Option<PaymentTypeId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderApproved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderApproved {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderInvoiced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderInvoiced {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderEvent {
    PurchaseOrderCreated(PurchaseOrderCreated),
    PurchaseOrderLineAdded(PurchaseOrderLineAdded),
    PurchaseOrderPartyChanged(PurchaseOrderPartyChanged),
    PurchaseOrderPaymentTypeSet(PurchaseOrderPaymentTypeSet),
    PurchaseOrderApproved(PurchaseOrderApproved),
    PurchaseOrderInvoiced(PurchaseOrderInvoiced),
}

impl PurchaseOrderEvent {
    pub fn tenant_and_id(&self) -> (TenantId, PurchaseOrderId) {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => (e.tenant_id, e.order_id),
            PurchaseOrderEvent::PurchaseOrderLineAdded(e) => (e.tenant_id, e.order_id),
            PurchaseOrderEvent::PurchaseOrderPartyChanged(e) => (e.tenant_id, e.order_id),
            PurchaseOrderEvent::PurchaseOrderPaymentTypeSet(e) => (e.tenant_id, e.order_id),
            PurchaseOrderEvent::PurchaseOrderApproved(e) => (e.tenant_id, e.order_id),
            PurchaseOrderEvent::PurchaseOrderInvoiced(e) => (e.tenant_id, e.order_id),
        }
    }
}

impl Event for PurchaseOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(_) => "purchasing.order.created",
            PurchaseOrderEvent::PurchaseOrderLineAdded(_) => "purchasing.order.line_added",
            PurchaseOrderEvent::PurchaseOrderPartyChanged(_) => "purchasing.order.party_changed",
            PurchaseOrderEvent::PurchaseOrderPaymentTypeSet(_) => "purchasing.order.payment_type_set",
            PurchaseOrderEvent::PurchaseOrderApproved(_) => "purchasing.order.approved",
            PurchaseOrderEvent::PurchaseOrderInvoiced(_) => "purchasing.order.invoiced",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderLineAdded(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderPartyChanged(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderPaymentTypeSet(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderApproved(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderInvoiced(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PurchaseOrder {
    type Command = PurchaseOrderCommand;
    type Event = PurchaseOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => {
                self.id = e.order_id;
                self.tenant_id = Some(e.tenant_id);
                self.party_id = e.party_id;
                self.payment_type = e.payment_type;
                self.status = PurchaseOrderStatus::Draft;
                self.lines.clear();
                self.invoices.clear();
                self.created = true;
            }
            PurchaseOrderEvent::PurchaseOrderLineAdded(e) => {
                self.lines.push(e.line.clone());
            }
            PurchaseOrderEvent::PurchaseOrderPartyChanged(e) => {
                self.party_id = e.party_id;
                self.payment_type = e.payment_type;
            }
            PurchaseOrderEvent::PurchaseOrderPaymentTypeSet(e) => {
                self.payment_type = e.payment_type;
            }
            PurchaseOrderEvent::PurchaseOrderApproved(_) => {
                self.status = PurchaseOrderStatus::Approved;
            }
            PurchaseOrderEvent::PurchaseOrderInvoiced(e) => {
                self.invoices.push(e.invoice_id);
                self.status = PurchaseOrderStatus::Invoiced;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseOrderCommand::CreatePurchaseOrder(cmd) => self.handle_create(cmd),
            PurchaseOrderCommand::AddLine(cmd) => self.handle_add_line(cmd),
            PurchaseOrderCommand::ChangeParty(cmd) => self.handle_change_party(cmd),
            PurchaseOrderCommand::SetPaymentType(cmd) => self.handle_set_payment_type(cmd),
            PurchaseOrderCommand::Approve(cmd) => self.handle_approve(cmd),
            PurchaseOrderCommand::RecordInvoice(cmd) => self.handle_record_invoice(cmd),
        }
    }
}

impl PurchaseOrder {
    fn ensure_existing(&self, tenant_id: TenantId, order_id: PurchaseOrderId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_draft(&self, action: &str) -> Result<(), DomainError> {
        if !self.is_editable() {
            return Err(DomainError::invariant(format!(
                "cannot {action} once the purchase order is {:?}",
                self.status
            )));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreatePurchaseOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("purchase order already exists"));
        }
        validate_purchase_payment_type(cmd.payment_type.as_ref())?;

        Ok(vec![PurchaseOrderEvent::PurchaseOrderCreated(PurchaseOrderCreated {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            party_id: cmd.party_id,
            payment_type: cmd.payment_type.map(|pt| pt.id),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_line(&self, cmd: &AddLine) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.order_id)?;
        self.ensure_draft("add lines")?;

        if cmd.line_type == LineType::Line && cmd.description.trim().is_empty() {
            return Err(DomainError::validation("line description cannot be empty"));
        }
        let total = line_amount(cmd.line_type, cmd.quantity, cmd.unit_price)
            .zip(self.untaxed_amount())
            .and_then(|(amount, total)| total.checked_add(amount));
        if total.is_none() {
            return Err(DomainError::validation("line amount is out of range"));
        }

        let next_line_no = (self.lines.len() as u32) + 1;
        Ok(vec![PurchaseOrderEvent::PurchaseOrderLineAdded(PurchaseOrderLineAdded {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            line: PurchaseLine {
                line_no: next_line_no,
                line_type: cmd.line_type,
                description: cmd.description.trim().to_string(),
                quantity: cmd.quantity,
                unit_price: cmd.unit_price,
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_party(&self, cmd: &ChangeParty) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.order_id)?;
        self.ensure_draft("change the party")?;

        if cmd.party_id.is_none() && cmd.party_payment_types.is_some() {
            return Err(DomainError::validation("party defaults given without a party"));
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderPartyChanged(PurchaseOrderPartyChanged {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            party_id: cmd.party_id,
            payment_type: on_change_party(cmd.party_payment_types.as_ref()),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_payment_type(&self, cmd: &SetPaymentType) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.order_id)?;
        self.ensure_draft("change the payment type")?;
        validate_purchase_payment_type(cmd.payment_type.as_ref())?;

        let payment_type = cmd.payment_type.map(|pt| pt.id);
        if payment_type == self.payment_type {
            return Ok(vec![]);
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderPaymentTypeSet(PurchaseOrderPaymentTypeSet {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            payment_type,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &Approve) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.order_id)?;

        if self.status != PurchaseOrderStatus::Draft {
            return Err(DomainError::invariant("only draft purchase orders can be approved"));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation("cannot approve purchase order without lines"));
        }
        if self.party_id.is_none() {
            return Err(DomainError::validation("cannot approve purchase order without a party"));
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderApproved(PurchaseOrderApproved {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_invoice(&self, cmd: &RecordInvoice) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.order_id)?;

        // Invariant: invoices are generated from approved orders only.
        if self.status != PurchaseOrderStatus::Approved {
            return Err(DomainError::invariant(
                "cannot invoice a purchase order before it is approved",
            ));
        }
        if self.invoices.contains(&cmd.invoice_id) {
            return Err(DomainError::conflict("invoice already recorded on purchase order"));
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderInvoiced(PurchaseOrderInvoiced {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            invoice_id: cmd.invoice_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
