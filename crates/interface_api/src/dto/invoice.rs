//! Invoice DTOs
//!
//! Decimal fields travel as JSON strings. Computed amounts are rounded to
//! the minor unit here and nowhere earlier.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{ClientId, ProjectId, ValidationErrors};
use domain_billing::{
    CreateInvoiceRequest, InvoiceFilter, InvoiceItem, InvoiceItemInput, InvoiceOrdering,
    InvoiceStatus, InvoiceType, InvoiceView, OrderingParseError, PaymentMode,
    UpdateInvoiceRequest,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceBody {
    pub project_id: Uuid,
    pub invoice_type: Option<InvoiceType>,
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub subject: String,
    pub issue_date: Option<NaiveDate>,
    pub due_date: NaiveDate,
    pub tax_percentage: Option<Decimal>,
    pub advance_payment: Option<Decimal>,
    pub payment_mode: Option<PaymentMode>,
    pub notes: Option<String>,
    #[validate(length(max = 255))]
    pub client_name: Option<String>,
    pub client_address: Option<String>,
    #[validate(length(max = 50))]
    pub client_phone: Option<String>,
    #[serde(default)]
    pub items: Vec<InvoiceItemBody>,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceItemBody {
    pub description: String,
    /// Defaults to 1
    pub quantity: Option<Decimal>,
    pub unit_price: Decimal,
    /// Defaults to the item's position in the list
    pub display_order: Option<i32>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateInvoiceBody {
    pub invoice_type: Option<InvoiceType>,
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub subject: Option<String>,
    pub status: Option<InvoiceStatus>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub tax_percentage: Option<Decimal>,
    pub advance_payment: Option<Decimal>,
    pub payment_mode: Option<PaymentMode>,
    pub notes: Option<String>,
    /// Replaces the whole item list when present
    pub items: Option<Vec<InvoiceItemBody>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListInvoicesQuery {
    pub project_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub status: Option<InvoiceStatus>,
    #[serde(default)]
    pub include_deleted: bool,
    /// Invoice number prefix, client name or project name
    pub search: Option<String>,
    /// `issue_date`, `due_date`, `total_ttc` or `created_at`, `-` for descending
    pub ordering: Option<String>,
}

impl From<InvoiceItemBody> for InvoiceItemInput {
    fn from(body: InvoiceItemBody) -> Self {
        InvoiceItemInput {
            description: body.description,
            quantity: body.quantity.unwrap_or(Decimal::ONE),
            unit_price: body.unit_price,
            display_order: body.display_order,
        }
    }
}

impl From<CreateInvoiceBody> for CreateInvoiceRequest {
    fn from(body: CreateInvoiceBody) -> Self {
        let mut request = CreateInvoiceRequest::new(ProjectId::from(body.project_id), body.subject, body.due_date);
        request.invoice_type = body.invoice_type.unwrap_or_default();
        request.issue_date = body.issue_date;
        request.tax_percentage = body.tax_percentage.unwrap_or(Decimal::ZERO);
        request.advance_payment = body.advance_payment.unwrap_or(Decimal::ZERO);
        request.payment_mode = body.payment_mode.unwrap_or_default();
        request.notes = body.notes.unwrap_or_default();
        request.client_name = body.client_name;
        request.client_address = body.client_address;
        request.client_phone = body.client_phone;
        request.items = body.items.into_iter().map(Into::into).collect();
        request
    }
}

impl From<UpdateInvoiceBody> for UpdateInvoiceRequest {
    fn from(body: UpdateInvoiceBody) -> Self {
        UpdateInvoiceRequest {
            invoice_type: body.invoice_type,
            subject: body.subject,
            status: body.status,
            issue_date: body.issue_date,
            due_date: body.due_date,
            tax_percentage: body.tax_percentage,
            advance_payment: body.advance_payment,
            payment_mode: body.payment_mode,
            notes: body.notes,
            items: body.items.map(|items| items.into_iter().map(Into::into).collect()),
        }
    }
}

impl TryFrom<ListInvoicesQuery> for InvoiceFilter {
    type Error = ValidationErrors;

    fn try_from(query: ListInvoicesQuery) -> Result<Self, Self::Error> {
        let ordering = match query.ordering.as_deref().map(str::trim) {
            None | Some("") => InvoiceOrdering::default(),
            Some(key) => key
                .parse()
                .map_err(|e: OrderingParseError| ValidationErrors::single("ordering", e.to_string()))?,
        };

        Ok(InvoiceFilter {
            project_id: query.project_id.map(ProjectId::from),
            client_id: query.client_id.map(ClientId::from),
            status: query.status,
            include_deleted: query.include_deleted,
            search: query.search,
            ordering,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InvoiceItemResponse {
    pub id: Uuid,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub display_order: i32,
    pub total_price: Decimal,
}

impl From<&InvoiceItem> for InvoiceItemResponse {
    fn from(item: &InvoiceItem) -> Self {
        Self {
            id: *item.id.as_uuid(),
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price.amount(),
            display_order: item.display_order,
            total_price: item.total_price().round_to_minor_unit().amount(),
        }
    }
}

/// Full invoice payload with computed fields
#[derive(Debug, Serialize, Deserialize)]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub invoice_number: String,
    pub project_id: Uuid,
    pub client_id: Uuid,
    pub invoice_type: InvoiceType,
    pub subject: String,
    /// Status as readers see it today
    pub status: InvoiceStatus,
    pub stored_status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub tax_percentage: Decimal,
    pub advance_payment: Decimal,
    pub payment_mode: PaymentMode,
    pub client_name: String,
    pub client_address: String,
    pub client_phone: String,
    pub notes: String,
    pub items: Vec<InvoiceItemResponse>,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total_ttc: Decimal,
    pub net_to_pay: Decimal,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<InvoiceView> for InvoiceResponse {
    fn from(view: InvoiceView) -> Self {
        let totals = view.totals.rounded();
        let invoice = view.invoice;
        let items = invoice.ordered_items().into_iter().map(InvoiceItemResponse::from).collect();

        Self {
            id: *invoice.id.as_uuid(),
            invoice_number: invoice.invoice_number.to_string(),
            project_id: *invoice.project_id.as_uuid(),
            client_id: *invoice.client_id.as_uuid(),
            invoice_type: invoice.invoice_type,
            subject: invoice.subject,
            status: view.status,
            stored_status: invoice.status,
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
            tax_percentage: invoice.tax_percentage,
            advance_payment: invoice.advance_payment.amount(),
            payment_mode: invoice.payment_mode,
            client_name: invoice.client.name,
            client_address: invoice.client.address,
            client_phone: invoice.client.phone,
            notes: invoice.notes,
            items,
            subtotal: totals.subtotal.amount(),
            tax_amount: totals.tax_amount.amount(),
            total_ttc: totals.total_ttc.amount(),
            net_to_pay: totals.net_to_pay.amount(),
            is_deleted: invoice.is_deleted,
            created_at: invoice.created_at,
            updated_at: invoice.updated_at,
        }
    }
}

/// One row of an invoice listing
#[derive(Debug, Serialize, Deserialize)]
pub struct InvoiceSummary {
    pub id: Uuid,
    pub invoice_number: String,
    pub project_id: Uuid,
    pub subject: String,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub client_name: String,
    pub total_ttc: Decimal,
    pub net_to_pay: Decimal,
    pub is_deleted: bool,
}

impl From<InvoiceView> for InvoiceSummary {
    fn from(view: InvoiceView) -> Self {
        let totals = view.totals.rounded();
        let invoice = view.invoice;
        Self {
            id: *invoice.id.as_uuid(),
            invoice_number: invoice.invoice_number.to_string(),
            project_id: *invoice.project_id.as_uuid(),
            subject: invoice.subject,
            status: view.status,
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
            client_name: invoice.client.name,
            total_ttc: totals.total_ttc.amount(),
            net_to_pay: totals.net_to_pay.amount(),
            is_deleted: invoice.is_deleted,
        }
    }
}
