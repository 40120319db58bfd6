//! Rows of the Importz database

use chrono::{DateTime, Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Table holding one profile per auth identity
pub const PROFILES_TABLE: &str = "profiles";
/// Table holding buyer requests
pub const ENCARGOS_TABLE: &str = "encargos";

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Comprador,
    Vendedora,
    Admin,
}

impl UserRole {
    pub const ALL: [UserRole; 3] = [UserRole::Comprador, UserRole::Vendedora, UserRole::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Comprador => "comprador",
            UserRole::Vendedora => "vendedora",
            UserRole::Admin => "admin",
        }
    }
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::Comprador
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity record, one per auth user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: UserRole,
    pub created_at: String,
    pub updated_at: String,
}

impl Profile {
    /// Name shown for the profile, falling back to the email
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.email)
    }
}

/// Insert payload for a profile created on first sign-in
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewProfile {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: UserRole,
}

/// Where an encargo is in its fulfillment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncargoStatus {
    PendienteCotizacion,
    CotizacionRecibida,
    EsperandoPagoDeposito,
    DepositoPagado,
    EnProcesoCompraUsa,
    EnCaminoArgentina,
    ListoParaEntregaFinal,
    EsperandoPagoFinal,
    Completado,
    CanceladoComprador,
    CanceladoVendedor,
    CanceladoAdmin,
}

/// Color family of a status badge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeColor {
    Yellow,
    Blue,
    Orange,
    Green,
    Purple,
    Indigo,
    Emerald,
    Amber,
    DarkGreen,
    Red,
}

impl BadgeColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeColor::Yellow => "yellow",
            BadgeColor::Blue => "blue",
            BadgeColor::Orange => "orange",
            BadgeColor::Green => "green",
            BadgeColor::Purple => "purple",
            BadgeColor::Indigo => "indigo",
            BadgeColor::Emerald => "emerald",
            BadgeColor::Amber => "amber",
            BadgeColor::DarkGreen => "dark-green",
            BadgeColor::Red => "red",
        }
    }
}

impl EncargoStatus {
    /// Every status, in progression order with the cancellations last
    pub const ALL: [EncargoStatus; 12] = [
        EncargoStatus::PendienteCotizacion,
        EncargoStatus::CotizacionRecibida,
        EncargoStatus::EsperandoPagoDeposito,
        EncargoStatus::DepositoPagado,
        EncargoStatus::EnProcesoCompraUsa,
        EncargoStatus::EnCaminoArgentina,
        EncargoStatus::ListoParaEntregaFinal,
        EncargoStatus::EsperandoPagoFinal,
        EncargoStatus::Completado,
        EncargoStatus::CanceladoComprador,
        EncargoStatus::CanceladoVendedor,
        EncargoStatus::CanceladoAdmin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EncargoStatus::PendienteCotizacion => "pendiente_cotizacion",
            EncargoStatus::CotizacionRecibida => "cotizacion_recibida",
            EncargoStatus::EsperandoPagoDeposito => "esperando_pago_deposito",
            EncargoStatus::DepositoPagado => "deposito_pagado",
            EncargoStatus::EnProcesoCompraUsa => "en_proceso_compra_usa",
            EncargoStatus::EnCaminoArgentina => "en_camino_argentina",
            EncargoStatus::ListoParaEntregaFinal => "listo_para_entrega_final",
            EncargoStatus::EsperandoPagoFinal => "esperando_pago_final",
            EncargoStatus::Completado => "completado",
            EncargoStatus::CanceladoComprador => "cancelado_comprador",
            EncargoStatus::CanceladoVendedor => "cancelado_vendedor",
            EncargoStatus::CanceladoAdmin => "cancelado_admin",
        }
    }

    /// Label shown on the status badge
    pub fn label(&self) -> &'static str {
        match self {
            EncargoStatus::PendienteCotizacion => "Pendiente Cotización",
            EncargoStatus::CotizacionRecibida => "Cotización Recibida",
            EncargoStatus::EsperandoPagoDeposito => "Esperando Depósito",
            EncargoStatus::DepositoPagado => "Depósito Pagado",
            EncargoStatus::EnProcesoCompraUsa => "Comprando en USA",
            EncargoStatus::EnCaminoArgentina => "En Camino",
            EncargoStatus::ListoParaEntregaFinal => "Listo para Entrega",
            EncargoStatus::EsperandoPagoFinal => "Esperando Pago Final",
            EncargoStatus::Completado => "Completado",
            EncargoStatus::CanceladoComprador => "Cancelado por Comprador",
            EncargoStatus::CanceladoVendedor => "Cancelado por Vendedora",
            EncargoStatus::CanceladoAdmin => "Cancelado por Admin",
        }
    }

    pub fn badge_color(&self) -> BadgeColor {
        match self {
            EncargoStatus::PendienteCotizacion => BadgeColor::Yellow,
            EncargoStatus::CotizacionRecibida => BadgeColor::Blue,
            EncargoStatus::EsperandoPagoDeposito => BadgeColor::Orange,
            EncargoStatus::DepositoPagado => BadgeColor::Green,
            EncargoStatus::EnProcesoCompraUsa => BadgeColor::Purple,
            EncargoStatus::EnCaminoArgentina => BadgeColor::Indigo,
            EncargoStatus::ListoParaEntregaFinal => BadgeColor::Emerald,
            EncargoStatus::EsperandoPagoFinal => BadgeColor::Amber,
            EncargoStatus::Completado => BadgeColor::DarkGreen,
            EncargoStatus::CanceladoComprador
            | EncargoStatus::CanceladoVendedor
            | EncargoStatus::CanceladoAdmin => BadgeColor::Red,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            EncargoStatus::CanceladoComprador | EncargoStatus::CanceladoVendedor | EncargoStatus::CanceladoAdmin
        )
    }

    /// Completed or cancelled
    pub fn is_terminal(&self) -> bool {
        *self == EncargoStatus::Completado || self.is_cancelled()
    }
}

impl Default for EncargoStatus {
    fn default() -> Self {
        EncargoStatus::PendienteCotizacion
    }
}

impl fmt::Display for EncargoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Product category offered by the create form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Electronica,
    Ropa,
    Hogar,
    Deportes,
    Belleza,
    Libros,
    Juguetes,
    Otros,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Electronica,
        Category::Ropa,
        Category::Hogar,
        Category::Deportes,
        Category::Belleza,
        Category::Libros,
        Category::Juguetes,
        Category::Otros,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Electronica => "electronica",
            Category::Ropa => "ropa",
            Category::Hogar => "hogar",
            Category::Deportes => "deportes",
            Category::Belleza => "belleza",
            Category::Libros => "libros",
            Category::Juguetes => "juguetes",
            Category::Otros => "otros",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Electronica => "Electrónica",
            Category::Ropa => "Ropa y Accesorios",
            Category::Hogar => "Hogar y Jardín",
            Category::Deportes => "Deportes",
            Category::Belleza => "Belleza y Salud",
            Category::Libros => "Libros",
            Category::Juguetes => "Juguetes",
            Category::Otros => "Otros",
        }
    }

    /// Parse the stored value; unknown values are `None`
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == value)
    }
}

/// A buyer's purchase request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encargo {
    pub id: String,
    pub comprador_id: String,
    pub product_name: String,
    pub product_url: Option<String>,
    pub quantity: i32,
    pub description: Option<String>,
    pub estimated_price: Option<String>,
    pub image_url: Option<String>,
    /// Stored as free text; see [`Category::parse`]
    pub category: Option<String>,
    pub status: EncargoStatus,
    pub created_at: String,
    pub updated_at: String,
    /// Joined buyer profile, when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comprador: Option<Profile>,
}

/// Insert payload for a new encargo
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewEncargo {
    pub comprador_id: String,
    pub product_name: String,
    pub product_url: Option<String>,
    pub quantity: i32,
    pub description: Option<String>,
    pub estimated_price: Option<String>,
    pub category: Option<Category>,
}

/// Quote state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CotizacionStatus {
    Pendiente,
    Aceptada,
    Rechazada,
    Expirada,
}

/// A seller's quote against one encargo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cotizacion {
    pub id: String,
    pub encargo_id: String,
    pub vendedora_id: String,
    pub precio_producto_usd: f64,
    pub comision_importacion: f64,
    pub precio_total_ars: f64,
    pub deposito_requerido_ars: f64,
    pub tiempo_estimado_dias: i32,
    pub comentarios: Option<String>,
    pub status: CotizacionStatus,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encargo: Option<Encargo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendedora: Option<Profile>,
}

/// Listing state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoPedidoStatus {
    Disponible,
    Reservado,
    Vendido,
    Cancelado,
}

/// A listing a seller offers directly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoPedido {
    pub id: String,
    pub vendedora_id: String,
    pub product_name: String,
    pub product_url: Option<String>,
    pub quantity: i32,
    pub precio_producto_usd: f64,
    pub precio_venta_ars: f64,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub status: AutoPedidoStatus,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendedora: Option<Profile>,
}

const MONTHS_ES: [&str; 12] = [
    "ene", "feb", "mar", "abr", "may", "jun", "jul", "ago", "sept", "oct", "nov", "dic",
];

/// Format a backend timestamp as an es-AR short date, e.g. `29 may 2025`.
///
/// Accepts RFC 3339 timestamps and plain dates; anything else is returned as is.
pub fn format_date(value: &str) -> String {
    let date = DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.date_naive())
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .or_else(|_| {
            // Postgres default text form: `2025-05-29 23:04:00.123+00`
            value
                .get(..10)
                .ok_or(())
                .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").map_err(|_| ()))
        });

    match date {
        Ok(date) => format!("{} {} {}", date.day(), MONTHS_ES[date.month0() as usize], date.year()),
        Err(_) => value.to_string(),
    }
}
