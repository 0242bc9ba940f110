//! Synchronous procurement facade.
//!
//! `ProcurementServices` wires the command dispatcher, the in-memory event
//! store and bus, the read-model projections and the payment type reference
//! guard. Committed events are applied to the projections before a call
//! returns, so queries right after a command see its effect.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, info};

use procura_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use procura_events::{EventBus, EventEnvelope, InMemoryEventBus, Subscription};
use procura_invoicing::{
    Invoice, InvoiceCommand, InvoiceId, InvoiceOrigin, IssueInvoice, LineType, VoidInvoice,
};
use procura_parties::{
    CUSTOMER_PAYMENT_TYPE_FIELD, ContactInfo, Party, PartyCommand, PartyId, PartyKind,
    RegisterParty, SUPPLIER_PAYMENT_TYPE_FIELD, SetPaymentTypes, SuspendParty, UpdateDetails,
};
use procura_payments::{
    CreatePaymentType, DeletePaymentType, PaymentKind, PaymentType, PaymentTypeCommand,
    PaymentTypeId, PaymentTypeRef, PaymentTypeUsage, UpdatePaymentType,
};
use procura_purchasing::{
    AddLine, Approve, ChangeParty, CreatePurchaseOrder, GenericInvoiceBuilder, InvoiceBuilder,
    PURCHASE_PAYMENT_TYPE_FIELD, PaymentTypeInvoiceBuilder, PurchaseInvoiceSource, PurchaseOrder,
    PurchaseOrderCommand, PurchaseOrderId, PurchaseOrderStatus, RecordInvoice, SetPaymentType,
    default_payment_type, on_change_party, validate_purchase_payment_type,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, InMemoryEventStore, StoredEvent};
use crate::projections::{
    InvoiceReadModel, InvoicesProjection, PartyDirectoryProjection, PartyReadModel,
    PaymentTypeDirectoryProjection, PaymentTypeReadModel, ProjectionError, PurchaseOrderReadModel,
    PurchaseOrdersProjection,
};
use crate::read_model::InMemoryTenantStore;
use crate::references::ReferenceGuard;

type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

type PaymentTypeDirectory =
    PaymentTypeDirectoryProjection<InMemoryTenantStore<PaymentTypeId, PaymentTypeReadModel>>;
type PartyDirectory = PartyDirectoryProjection<InMemoryTenantStore<PartyId, PartyReadModel>>;
type PurchaseOrders =
    PurchaseOrdersProjection<InMemoryTenantStore<PurchaseOrderId, PurchaseOrderReadModel>>;
type Invoices = InvoicesProjection<InMemoryTenantStore<InvoiceId, InvoiceReadModel>>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("projection failed: {0}")]
    Projection(#[from] ProjectionError),

    /// Refused before dispatch (the aggregate would refuse it too).
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("unknown payment type {0}")]
    UnknownPaymentType(PaymentTypeId),

    #[error("unknown party {0}")]
    UnknownParty(PartyId),

    #[error("unknown purchase order {0}")]
    UnknownPurchaseOrder(PurchaseOrderId),

    #[error("unknown invoice {0}")]
    UnknownInvoice(InvoiceId),
}

impl ServiceError {
    /// The domain refusal behind this error, whether raised before or during dispatch.
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(e) => Some(e),
            ServiceError::Dispatch(e) => e.as_domain(),
            _ => None,
        }
    }
}

/// Input for [`ProcurementServices::add_purchase_line`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPurchaseLine {
    pub line_type: LineType,
    pub description: String,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
}

impl NewPurchaseLine {
    pub fn line(description: impl Into<String>, quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            line_type: LineType::Line,
            description: description.into(),
            quantity: Some(quantity),
            unit_price: Some(unit_price),
        }
    }

    pub fn text(line_type: LineType, description: impl Into<String>) -> Self {
        Self {
            line_type,
            description: description.into(),
            quantity: None,
            unit_price: None,
        }
    }
}

#[derive(Debug)]
pub struct ProcurementServices {
    dispatcher: CommandDispatcher<InMemoryEventStore, Bus>,
    payment_types: Arc<PaymentTypeDirectory>,
    parties: Arc<PartyDirectory>,
    orders: Arc<PurchaseOrders>,
    invoices: Arc<Invoices>,
    references: ReferenceGuard,
}

impl Default for ProcurementServices {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcurementServices {
    pub fn new() -> Self {
        let payment_types = Arc::new(PaymentTypeDirectory::new(InMemoryTenantStore::new()));
        let parties = Arc::new(PartyDirectory::new(InMemoryTenantStore::new()));
        let orders = Arc::new(PurchaseOrders::new(InMemoryTenantStore::new()));
        let invoices = Arc::new(Invoices::new(InMemoryTenantStore::new()));

        let mut references = ReferenceGuard::new();
        {
            let orders = Arc::clone(&orders);
            references.register(PURCHASE_PAYMENT_TYPE_FIELD, move |tenant_id, pt| {
                orders.count_by_payment_type(tenant_id, pt)
            });
        }
        {
            let parties = Arc::clone(&parties);
            references.register(SUPPLIER_PAYMENT_TYPE_FIELD, move |tenant_id, pt| {
                parties.count_supplier_default(tenant_id, pt)
            });
        }
        {
            let parties = Arc::clone(&parties);
            references.register(CUSTOMER_PAYMENT_TYPE_FIELD, move |tenant_id, pt| {
                parties.count_customer_default(tenant_id, pt)
            });
        }

        Self {
            dispatcher: CommandDispatcher::new(InMemoryEventStore::new(), Arc::new(InMemoryEventBus::new())),
            payment_types,
            parties,
            orders,
            invoices,
            references,
        }
    }

    /// Subscribe to every envelope committed from now on.
    pub fn subscribe(&self) -> Subscription<EventEnvelope<JsonValue>> {
        self.dispatcher.bus().subscribe()
    }

    pub fn references(&self) -> &ReferenceGuard {
        &self.references
    }

    pub fn event_count(&self) -> usize {
        self.dispatcher.store().len()
    }

    // ---- payment types ----

    pub fn create_payment_type(
        &self,
        tenant_id: TenantId,
        name: &str,
        kind: PaymentKind,
    ) -> Result<PaymentTypeId, ServiceError> {
        let payment_type_id = PaymentTypeId::new(AggregateId::new());
        self.run(
            tenant_id,
            payment_type_id.0,
            procura_payments::AGGREGATE_TYPE,
            PaymentTypeCommand::CreatePaymentType(CreatePaymentType {
                tenant_id,
                payment_type_id,
                name: name.to_string(),
                kind,
                occurred_at: Utc::now(),
            }),
            |_, id| PaymentType::empty(PaymentTypeId::new(id)),
        )?;
        info!(%tenant_id, %payment_type_id, %kind, "payment type created");
        Ok(payment_type_id)
    }

    /// Rename and/or change the kind. A kind change is refused while any
    /// registered field references the payment type.
    pub fn update_payment_type(
        &self,
        tenant_id: TenantId,
        payment_type_id: PaymentTypeId,
        name: Option<&str>,
        kind: Option<PaymentKind>,
    ) -> Result<(), ServiceError> {
        self.known_payment_type(tenant_id, payment_type_id)?;
        let usages = self.references.usages(tenant_id, payment_type_id);
        self.run(
            tenant_id,
            payment_type_id.0,
            procura_payments::AGGREGATE_TYPE,
            PaymentTypeCommand::UpdatePaymentType(UpdatePaymentType {
                tenant_id,
                payment_type_id,
                name: name.map(str::to_string),
                kind,
                usages,
                occurred_at: Utc::now(),
            }),
            |_, id| PaymentType::empty(PaymentTypeId::new(id)),
        )?;
        info!(%tenant_id, %payment_type_id, "payment type updated");
        Ok(())
    }

    pub fn delete_payment_type(
        &self,
        tenant_id: TenantId,
        payment_type_id: PaymentTypeId,
    ) -> Result<(), ServiceError> {
        self.known_payment_type(tenant_id, payment_type_id)?;
        let usages = self.references.usages(tenant_id, payment_type_id);
        self.run(
            tenant_id,
            payment_type_id.0,
            procura_payments::AGGREGATE_TYPE,
            PaymentTypeCommand::DeletePaymentType(DeletePaymentType {
                tenant_id,
                payment_type_id,
                usages,
                occurred_at: Utc::now(),
            }),
            |_, id| PaymentType::empty(PaymentTypeId::new(id)),
        )?;
        info!(%tenant_id, %payment_type_id, "payment type deleted");
        Ok(())
    }

    pub fn payment_type_usages(&self, tenant_id: TenantId, payment_type_id: PaymentTypeId) -> Vec<PaymentTypeUsage> {
        self.references.usages(tenant_id, payment_type_id)
    }

    // ---- parties ----

    pub fn register_party(
        &self,
        tenant_id: TenantId,
        name: &str,
        kind: PartyKind,
        contact: Option<ContactInfo>,
    ) -> Result<PartyId, ServiceError> {
        let party_id = PartyId::new(AggregateId::new());
        self.run(
            tenant_id,
            party_id.0,
            procura_parties::AGGREGATE_TYPE,
            PartyCommand::RegisterParty(RegisterParty {
                tenant_id,
                party_id,
                kind,
                name: name.to_string(),
                contact,
                occurred_at: Utc::now(),
            }),
            |_, id| Party::empty(PartyId::new(id)),
        )?;
        info!(%tenant_id, %party_id, "party registered");
        Ok(party_id)
    }

    /// Rename a party and/or replace its contact details.
    pub fn update_party(
        &self,
        tenant_id: TenantId,
        party_id: PartyId,
        name: Option<&str>,
        contact: Option<ContactInfo>,
    ) -> Result<(), ServiceError> {
        self.known_party(tenant_id, party_id)?;
        self.run(
            tenant_id,
            party_id.0,
            procura_parties::AGGREGATE_TYPE,
            PartyCommand::UpdateDetails(UpdateDetails {
                tenant_id,
                party_id,
                name: name.map(str::to_string),
                contact,
                occurred_at: Utc::now(),
            }),
            |_, id| Party::empty(PartyId::new(id)),
        )?;
        info!(%tenant_id, %party_id, "party updated");
        Ok(())
    }

    /// Suspend a party. Suspended parties cannot be put on purchases and
    /// their purchases cannot be invoiced.
    pub fn suspend_party(
        &self,
        tenant_id: TenantId,
        party_id: PartyId,
        reason: Option<String>,
    ) -> Result<(), ServiceError> {
        self.known_party(tenant_id, party_id)?;
        self.run(
            tenant_id,
            party_id.0,
            procura_parties::AGGREGATE_TYPE,
            PartyCommand::SuspendParty(SuspendParty {
                tenant_id,
                party_id,
                reason,
                occurred_at: Utc::now(),
            }),
            |_, id| Party::empty(PartyId::new(id)),
        )?;
        info!(%tenant_id, %party_id, "party suspended");
        Ok(())
    }

    /// Replace both role defaults of a party.
    pub fn set_party_payment_types(
        &self,
        tenant_id: TenantId,
        party_id: PartyId,
        supplier: Option<PaymentTypeId>,
        customer: Option<PaymentTypeId>,
    ) -> Result<(), ServiceError> {
        self.known_party(tenant_id, party_id)?;
        let supplier_payment_type = self.payment_type_ref(tenant_id, supplier)?;
        let customer_payment_type = self.payment_type_ref(tenant_id, customer)?;
        self.run(
            tenant_id,
            party_id.0,
            procura_parties::AGGREGATE_TYPE,
            PartyCommand::SetPaymentTypes(SetPaymentTypes {
                tenant_id,
                party_id,
                supplier_payment_type,
                customer_payment_type,
                occurred_at: Utc::now(),
            }),
            |_, id| Party::empty(PartyId::new(id)),
        )?;
        info!(%tenant_id, %party_id, ?supplier, ?customer, "party payment types set");
        Ok(())
    }

    // ---- purchasing ----

    /// Payment type a new purchase starts with: the only live payable/both
    /// payment type of the tenant, or none.
    pub fn default_purchase_payment_type(&self, tenant_id: TenantId) -> Option<PaymentTypeId> {
        let candidates: Vec<PaymentTypeRef> = self
            .payment_types
            .list_active(tenant_id)
            .iter()
            .map(PaymentTypeReadModel::to_ref)
            .collect();
        default_payment_type(&candidates)
    }

    /// Create a draft purchase with the default payment type. When a party is
    /// given it is then set through the party-change reaction, which replaces
    /// the default with the party's supplier default (or none).
    pub fn create_purchase(
        &self,
        tenant_id: TenantId,
        party_id: Option<PartyId>,
    ) -> Result<PurchaseOrderId, ServiceError> {
        if let Some(party_id) = party_id {
            self.transacting_party(tenant_id, party_id)?;
        }

        let order_id = PurchaseOrderId::new(AggregateId::new());
        let default = self.default_purchase_payment_type(tenant_id);
        debug!(%tenant_id, ?default, "default purchase payment type");
        let payment_type = self.payment_type_ref(tenant_id, default)?;

        self.run_order(
            tenant_id,
            PurchaseOrderCommand::CreatePurchaseOrder(CreatePurchaseOrder {
                tenant_id,
                order_id,
                party_id: None,
                payment_type,
                occurred_at: Utc::now(),
            }),
            order_id,
        )?;
        info!(%tenant_id, %order_id, "purchase order created");

        if party_id.is_some() {
            self.change_purchase_party(tenant_id, order_id, party_id)?;
        }
        Ok(order_id)
    }

    /// Payment type the purchase would get if its party became `party_id`,
    /// without saving anything.
    pub fn preview_party_change(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
        party_id: Option<PartyId>,
    ) -> Result<Option<PaymentTypeId>, ServiceError> {
        self.known_order(tenant_id, order_id)?;
        let defaults = match party_id {
            Some(party_id) => Some(self.transacting_party(tenant_id, party_id)?.payment_types()),
            None => None,
        };
        Ok(on_change_party(defaults.as_ref()))
    }

    /// Change the party and reset the payment type from its supplier default.
    pub fn change_purchase_party(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
        party_id: Option<PartyId>,
    ) -> Result<Option<PaymentTypeId>, ServiceError> {
        self.known_order(tenant_id, order_id)?;
        let party_payment_types = match party_id {
            Some(party_id) => Some(self.transacting_party(tenant_id, party_id)?.payment_types()),
            None => None,
        };

        self.run_order(
            tenant_id,
            PurchaseOrderCommand::ChangeParty(ChangeParty {
                tenant_id,
                order_id,
                party_id,
                party_payment_types,
                occurred_at: Utc::now(),
            }),
            order_id,
        )?;

        let payment_type = self.known_order(tenant_id, order_id)?.payment_type;
        info!(%tenant_id, %order_id, ?party_id, ?payment_type, "purchase party changed");
        Ok(payment_type)
    }

    pub fn set_purchase_payment_type(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
        payment_type: Option<PaymentTypeId>,
    ) -> Result<(), ServiceError> {
        self.known_order(tenant_id, order_id)?;
        let payment_type = self.payment_type_ref(tenant_id, payment_type)?;
        validate_purchase_payment_type(payment_type.as_ref())?;

        self.run_order(
            tenant_id,
            PurchaseOrderCommand::SetPaymentType(SetPaymentType {
                tenant_id,
                order_id,
                payment_type,
                occurred_at: Utc::now(),
            }),
            order_id,
        )?;
        info!(%tenant_id, %order_id, payment_type = ?payment_type.map(|pt| pt.id), "purchase payment type set");
        Ok(())
    }

    pub fn add_purchase_line(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
        line: NewPurchaseLine,
    ) -> Result<(), ServiceError> {
        self.known_order(tenant_id, order_id)?;
        self.run_order(
            tenant_id,
            PurchaseOrderCommand::AddLine(AddLine {
                tenant_id,
                order_id,
                line_type: line.line_type,
                description: line.description,
                quantity: line.quantity,
                unit_price: line.unit_price,
                occurred_at: Utc::now(),
            }),
            order_id,
        )?;
        Ok(())
    }

    pub fn approve_purchase(&self, tenant_id: TenantId, order_id: PurchaseOrderId) -> Result<(), ServiceError> {
        self.known_order(tenant_id, order_id)?;
        self.run_order(
            tenant_id,
            PurchaseOrderCommand::Approve(Approve {
                tenant_id,
                order_id,
                occurred_at: Utc::now(),
            }),
            order_id,
        )?;
        info!(%tenant_id, %order_id, "purchase order approved");
        Ok(())
    }

    /// Generate, issue and record the supplier invoice of an approved purchase.
    ///
    /// Returns `Ok(None)` when the purchase has nothing to invoice.
    pub fn create_invoice(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
    ) -> Result<Option<InvoiceId>, ServiceError> {
        let order = self.load_purchase_order(tenant_id, order_id)?;
        if order.status() != PurchaseOrderStatus::Approved {
            return Err(DomainError::invariant(format!(
                "cannot invoice a purchase order that is {:?}",
                order.status()
            ))
            .into());
        }

        let payment_type = match order.payment_type() {
            Some(id) => Some(
                self.payment_types
                    .get(tenant_id, &id)
                    .map(|rm| rm.to_ref())
                    .ok_or(ServiceError::UnknownPaymentType(id))?,
            ),
            None => None,
        };
        let party_payment_types = match order.party_id() {
            Some(party_id) => Some(self.transacting_party(tenant_id, party_id)?.payment_types()),
            None => None,
        };

        let source = PurchaseInvoiceSource::new(&order)
            .with_payment_type(payment_type)
            .with_party_payment_types(party_payment_types);
        let Some(draft) = PaymentTypeInvoiceBuilder::new(GenericInvoiceBuilder).build_invoice(&source)? else {
            info!(%tenant_id, %order_id, "nothing to invoice");
            return Ok(None);
        };
        debug!(
            %tenant_id,
            %order_id,
            untaxed_amount = ?draft.untaxed_amount,
            payment_type = ?draft.payment_type,
            "invoice payment type resolved"
        );

        let invoice_id = InvoiceId::new(AggregateId::new());
        self.run(
            tenant_id,
            invoice_id.0,
            procura_invoicing::AGGREGATE_TYPE,
            InvoiceCommand::IssueInvoice(IssueInvoice::from_draft(tenant_id, invoice_id, draft, Utc::now())),
            |_, id| Invoice::empty(InvoiceId::new(id)),
        )?;
        self.run_order(
            tenant_id,
            PurchaseOrderCommand::RecordInvoice(RecordInvoice {
                tenant_id,
                order_id,
                invoice_id,
                occurred_at: Utc::now(),
            }),
            order_id,
        )?;

        info!(%tenant_id, %order_id, %invoice_id, "invoice issued");
        Ok(Some(invoice_id))
    }

    pub fn void_invoice(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        reason: Option<String>,
    ) -> Result<(), ServiceError> {
        if self.invoices.get(tenant_id, &invoice_id).is_none() {
            return Err(ServiceError::UnknownInvoice(invoice_id));
        }
        self.run(
            tenant_id,
            invoice_id.0,
            procura_invoicing::AGGREGATE_TYPE,
            InvoiceCommand::VoidInvoice(VoidInvoice {
                tenant_id,
                invoice_id,
                reason,
                occurred_at: Utc::now(),
            }),
            |_, id| Invoice::empty(InvoiceId::new(id)),
        )?;
        info!(%tenant_id, %invoice_id, "invoice voided");
        Ok(())
    }

    // ---- queries ----

    pub fn payment_type(&self, tenant_id: TenantId, payment_type_id: PaymentTypeId) -> Option<PaymentTypeReadModel> {
        self.payment_types.get(tenant_id, &payment_type_id)
    }

    pub fn payment_types(&self, tenant_id: TenantId) -> Vec<PaymentTypeReadModel> {
        self.payment_types.list_active(tenant_id)
    }

    /// Payment types that may be selected on a purchase.
    pub fn selectable_purchase_payment_types(&self, tenant_id: TenantId) -> Vec<PaymentTypeRef> {
        self.payment_types.list_covering(tenant_id, PaymentKind::Payable)
    }

    pub fn party(&self, tenant_id: TenantId, party_id: PartyId) -> Option<PartyReadModel> {
        self.parties.get(tenant_id, &party_id)
    }

    pub fn purchase_order(&self, tenant_id: TenantId, order_id: PurchaseOrderId) -> Option<PurchaseOrderReadModel> {
        self.orders.get(tenant_id, &order_id)
    }

    pub fn purchase_orders(&self, tenant_id: TenantId) -> Vec<PurchaseOrderReadModel> {
        self.orders.list(tenant_id)
    }

    /// The purchase order aggregate rehydrated from its stream.
    pub fn load_purchase_order(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
    ) -> Result<PurchaseOrder, ServiceError> {
        let order = self
            .dispatcher
            .load(tenant_id, order_id.0, |_, id| PurchaseOrder::empty(PurchaseOrderId::new(id)))?;
        if order.version() == 0 {
            return Err(ServiceError::UnknownPurchaseOrder(order_id));
        }
        Ok(order)
    }

    /// The party aggregate rehydrated from its stream.
    pub fn load_party(&self, tenant_id: TenantId, party_id: PartyId) -> Result<Party, ServiceError> {
        let party = self
            .dispatcher
            .load(tenant_id, party_id.0, |_, id| Party::empty(PartyId::new(id)))?;
        if party.version() == 0 {
            return Err(ServiceError::UnknownParty(party_id));
        }
        Ok(party)
    }

    pub fn invoice(&self, tenant_id: TenantId, invoice_id: InvoiceId) -> Option<InvoiceReadModel> {
        self.invoices.get(tenant_id, &invoice_id)
    }

    pub fn invoices_for_purchase(&self, tenant_id: TenantId, order_id: PurchaseOrderId) -> Vec<InvoiceReadModel> {
        self.invoices
            .list_for_origin(tenant_id, InvoiceOrigin::PurchaseOrder(order_id.0))
    }

    /// Drop and rebuild every read model of a tenant from the event store.
    pub fn rebuild_projections(&self, tenant_id: TenantId) -> Result<(), ServiceError> {
        let envelopes: Vec<_> = self
            .dispatcher
            .store()
            .load_tenant(tenant_id)
            .map_err(DispatchError::from)?
            .iter()
            .map(StoredEvent::to_envelope)
            .collect();

        self.payment_types.rebuild_from_scratch(envelopes.clone())?;
        self.parties.rebuild_from_scratch(envelopes.clone())?;
        self.orders.rebuild_from_scratch(envelopes.clone())?;
        self.invoices.rebuild_from_scratch(envelopes)?;
        info!(%tenant_id, "projections rebuilt");
        Ok(())
    }

    // ---- plumbing ----

    fn run<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &'static str,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, ServiceError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: procura_events::Event + Serialize + DeserializeOwned,
    {
        let committed = self
            .dispatcher
            .dispatch(tenant_id, aggregate_id, aggregate_type, command, make_aggregate)?;
        self.project(&committed)?;
        Ok(committed)
    }

    fn run_order(
        &self,
        tenant_id: TenantId,
        command: PurchaseOrderCommand,
        order_id: PurchaseOrderId,
    ) -> Result<Vec<StoredEvent>, ServiceError> {
        self.run(
            tenant_id,
            order_id.0,
            procura_purchasing::AGGREGATE_TYPE,
            command,
            |_, id| PurchaseOrder::empty(PurchaseOrderId::new(id)),
        )
    }

    fn project(&self, committed: &[StoredEvent]) -> Result<(), ProjectionError> {
        for stored in committed {
            let envelope = stored.to_envelope();
            self.payment_types.apply_envelope(&envelope)?;
            self.parties.apply_envelope(&envelope)?;
            self.orders.apply_envelope(&envelope)?;
            self.invoices.apply_envelope(&envelope)?;
        }
        Ok(())
    }

    fn known_payment_type(
        &self,
        tenant_id: TenantId,
        payment_type_id: PaymentTypeId,
    ) -> Result<PaymentTypeReadModel, ServiceError> {
        self.payment_types
            .get(tenant_id, &payment_type_id)
            .filter(|rm| rm.active)
            .ok_or(ServiceError::UnknownPaymentType(payment_type_id))
    }

    /// Snapshot of a live payment type for commands that check its kind.
    fn payment_type_ref(
        &self,
        tenant_id: TenantId,
        payment_type_id: Option<PaymentTypeId>,
    ) -> Result<Option<PaymentTypeRef>, ServiceError> {
        payment_type_id
            .map(|id| self.known_payment_type(tenant_id, id).map(|rm| rm.to_ref()))
            .transpose()
    }

    /// The party, refused when it may not take part in purchasing.
    fn transacting_party(&self, tenant_id: TenantId, party_id: PartyId) -> Result<Party, ServiceError> {
        let party = self.load_party(tenant_id, party_id)?;
        if !party.can_transact() {
            return Err(DomainError::invariant(format!("party {party_id} is {:?}", party.status())).into());
        }
        Ok(party)
    }

    fn known_party(&self, tenant_id: TenantId, party_id: PartyId) -> Result<PartyReadModel, ServiceError> {
        self.parties
            .get(tenant_id, &party_id)
            .ok_or(ServiceError::UnknownParty(party_id))
    }

    fn known_order(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
    ) -> Result<PurchaseOrderReadModel, ServiceError> {
        self.orders
            .get(tenant_id, &order_id)
            .ok_or(ServiceError::UnknownPurchaseOrder(order_id))
    }
}
