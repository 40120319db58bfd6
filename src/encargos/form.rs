//! Create-encargo form

use log::{error, info};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use crate::error::{Error, Result};
use crate::gateway::{decode, Gateway};
use crate::models::{Category, Encargo, NewEncargo, ENCARGOS_TABLE};

pub const TITLE: &str = "Crear Nuevo Encargo";
pub const SUBMIT_LABEL: &str = "Crear Encargo";
pub const SUBMITTING_LABEL: &str = "Creando...";
pub const INSERT_ALERT: &str = "Error al crear el encargo. Por favor intenta de nuevo.";

/// Why a submit did not produce an encargo
#[derive(Error, Debug)]
pub enum FormError {
    /// Input rejected, nothing was sent
    #[error("{0}")]
    Validation(String),

    /// A submit is already running
    #[error("Ya se está creando un encargo")]
    InFlight,

    /// The backend refused the insert; shown to the user as an alert
    #[error("Error al crear el encargo. Por favor intenta de nuevo.")]
    Insert(#[source] Error),
}

impl FormError {
    /// The blocking alert to show, if this error warrants one
    pub fn alert(&self) -> Option<&'static str> {
        match self {
            FormError::Insert(_) => Some(INSERT_ALERT),
            FormError::Validation(_) | FormError::InFlight => None,
        }
    }
}

/// Editable fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    ProductName,
    ProductUrl,
    Quantity,
    Description,
    EstimatedPrice,
    Category,
}

impl FormField {
    pub const ALL: [FormField; 6] = [
        FormField::ProductName,
        FormField::ProductUrl,
        FormField::Quantity,
        FormField::Description,
        FormField::EstimatedPrice,
        FormField::Category,
    ];

    /// Column the field is stored in
    pub fn name(&self) -> &'static str {
        match self {
            FormField::ProductName => "product_name",
            FormField::ProductUrl => "product_url",
            FormField::Quantity => "quantity",
            FormField::Description => "description",
            FormField::EstimatedPrice => "estimated_price",
            FormField::Category => "category",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }

    pub fn label(&self) -> &'static str {
        match self {
            FormField::ProductName => "Nombre del Producto *",
            FormField::ProductUrl => "URL del Producto",
            FormField::Quantity => "Cantidad",
            FormField::Description => "Descripción",
            FormField::EstimatedPrice => "Precio Estimado",
            FormField::Category => "Categoría",
        }
    }
}

/// Raw form input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncargoFormData {
    pub product_name: String,
    pub product_url: String,
    pub quantity: i32,
    pub description: String,
    pub estimated_price: String,
    /// Stored category value, empty when none was picked
    pub category: String,
}

impl Default for EncargoFormData {
    fn default() -> Self {
        Self {
            product_name: String::new(),
            product_url: String::new(),
            quantity: 1,
            description: String::new(),
            estimated_price: String::new(),
            category: String::new(),
        }
    }
}

impl EncargoFormData {
    /// Update one field from its text input
    pub fn set(&mut self, field: FormField, value: &str) {
        match field {
            FormField::ProductName => self.product_name = value.to_string(),
            FormField::ProductUrl => self.product_url = value.to_string(),
            FormField::Quantity => self.quantity = parse_quantity(value),
            FormField::Description => self.description = value.to_string(),
            FormField::EstimatedPrice => self.estimated_price = value.to_string(),
            FormField::Category => self.category = value.to_string(),
        }
    }

    /// The insert payload for `comprador_id`, or why there is none
    pub fn to_new_encargo(&self, comprador_id: &str) -> Result<NewEncargo> {
        let product_name = self.product_name.trim();
        if product_name.is_empty() {
            return Err(Error::validation("El nombre del producto es obligatorio"));
        }
        if self.quantity < 1 {
            return Err(Error::validation("La cantidad debe ser al menos 1"));
        }

        let category = match self.category.trim() {
            "" => None,
            value => Some(
                Category::parse(value).ok_or_else(|| Error::validation(format!("Categoría desconocida: {}", value)))?,
            ),
        };

        Ok(NewEncargo {
            comprador_id: comprador_id.to_string(),
            product_name: product_name.to_string(),
            product_url: optional(&self.product_url),
            quantity: self.quantity,
            description: optional(&self.description),
            estimated_price: optional(&self.estimated_price),
            category,
        })
    }
}

/// Unparsable or zero quantities fall back to 1
/// Integer prefix of `value` ("2.5" is 2, "12abc" is 12); 1 when there is none or it is 0
fn parse_quantity(value: &str) -> i32 {
    let value = value.trim_start();
    let digits_start = usize::from(value.starts_with(['+', '-']));
    let digits_end = value[digits_start..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(value.len(), |i| digits_start + i);

    match value[..digits_end].parse::<i32>() {
        Ok(0) | Err(_) => 1,
        Ok(quantity) => quantity,
    }
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Clears the in-flight flag when the submit finishes, however it finishes
struct Submitting<'a>(&'a AtomicBool);

impl<'a> Submitting<'a> {
    fn begin(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Submitting(flag))
    }
}

impl Drop for Submitting<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The form, scoped to one comprador
pub struct CreateEncargoForm {
    comprador_id: String,
    data: Mutex<EncargoFormData>,
    submitting: AtomicBool,
}

impl CreateEncargoForm {
    pub fn new(comprador_id: impl Into<String>) -> Self {
        Self {
            comprador_id: comprador_id.into(),
            data: Mutex::new(EncargoFormData::default()),
            submitting: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EncargoFormData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn comprador_id(&self) -> &str {
        &self.comprador_id
    }

    pub fn data(&self) -> EncargoFormData {
        self.lock().clone()
    }

    pub fn set_field(&self, field: FormField, value: &str) {
        self.lock().set(field, value);
    }

    /// Back to an empty form
    pub fn reset(&self) {
        *self.lock() = EncargoFormData::default();
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::SeqCst)
    }

    pub fn submit_label(&self) -> &'static str {
        if self.is_submitting() {
            SUBMITTING_LABEL
        } else {
            SUBMIT_LABEL
        }
    }

    /// Insert the encargo and return the stored row
    pub async fn submit<G: Gateway + ?Sized>(&self, gateway: &G) -> std::result::Result<Encargo, FormError> {
        let _submitting = Submitting::begin(&self.submitting).ok_or(FormError::InFlight)?;

        let new_encargo = self
            .lock()
            .to_new_encargo(&self.comprador_id)
            .map_err(|e| FormError::Validation(e.to_string()))?;

        match self.insert(gateway, &new_encargo).await {
            Ok(encargo) => {
                info!("Created encargo {} for {}", encargo.id, self.comprador_id);
                Ok(encargo)
            }
            Err(e) => {
                error!("Error creating encargo: {}", e);
                Err(FormError::Insert(e))
            }
        }
    }

    async fn insert<G: Gateway + ?Sized>(&self, gateway: &G, new_encargo: &NewEncargo) -> Result<Encargo> {
        let row = gateway
            .insert(ENCARGOS_TABLE, serde_json::to_value(new_encargo)?)
            .await?;
        decode(row)
    }
}

impl fmt::Display for CreateEncargoForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data();
        writeln!(f, "{}", TITLE)?;
        for field in FormField::ALL {
            let value = match field {
                FormField::ProductName => data.product_name.clone(),
                FormField::ProductUrl => data.product_url.clone(),
                FormField::Quantity => data.quantity.to_string(),
                FormField::Description => data.description.clone(),
                FormField::EstimatedPrice => data.estimated_price.clone(),
                FormField::Category => Category::parse(&data.category)
                    .map(|c| c.label().to_string())
                    .unwrap_or_else(|| data.category.clone()),
            };
            writeln!(f, "  {}: {}", field.label(), value)?;
        }
        write!(f, "[{}]", self.submit_label())
    }
}
