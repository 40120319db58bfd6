//! Role-scoped encargo list
//!
//! Compradores see their own encargos; vendedoras and admins see all of them.
//! The list is keyed on the viewer's role and id and reloads when that key
//! changes.

use log::{debug, error};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

use crate::error::Result;
use crate::gateway::{decode_all, Gateway, SelectQuery};
use crate::models::{format_date, BadgeColor, Category, Encargo, EncargoStatus, UserRole, ENCARGOS_TABLE};
use crate::postgrest::{Filter, Order};

/// Columns read for the list, with the buyer profile embedded
pub const LIST_COLUMNS: &str = "*, comprador:profiles!encargos_comprador_id_fkey(*)";

pub const LOADING_TEXT: &str = "Cargando encargos...";
pub const EMPTY_COMPRADOR: &str = "No tienes encargos aún. ¡Crea tu primer encargo!";
pub const EMPTY_OTHERS: &str = "No hay encargos disponibles en este momento.";
pub const HEADING_COMPRADOR: &str = "Mis Encargos";
pub const HEADING_OTHERS: &str = "Encargos Disponibles";
pub const NO_CATEGORY: &str = "No especificada";
pub const PRODUCT_LINK: &str = "Ver producto →";

/// Who is looking at the list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListKey {
    pub role: UserRole,
    pub user_id: String,
}

impl ListKey {
    pub fn new(role: UserRole, user_id: impl Into<String>) -> Self {
        Self {
            role,
            user_id: user_id.into(),
        }
    }
}

/// Loaded rows
#[derive(Debug, Clone, PartialEq)]
pub struct ListState {
    pub loading: bool,
    pub encargos: Vec<Encargo>,
}

impl Default for ListState {
    fn default() -> Self {
        Self {
            loading: true,
            encargos: Vec::new(),
        }
    }
}

/// The read issued for `key`
pub fn query_for(key: &ListKey) -> SelectQuery {
    let query = SelectQuery::new(LIST_COLUMNS).order(Order::desc("created_at"));
    match key.role {
        UserRole::Comprador => query.filter(Filter::eq("comprador_id", &key.user_id)),
        UserRole::Vendedora | UserRole::Admin => query,
    }
}

/// The list component
pub struct EncargoList<G: Gateway> {
    gateway: Arc<G>,
    key: Mutex<ListKey>,
    generation: AtomicU64,
    state: watch::Sender<ListState>,
}

impl<G: Gateway> EncargoList<G> {
    /// Create the list for `key`; nothing is read until [`mount`](Self::mount)
    pub fn new(gateway: Arc<G>, key: ListKey) -> Self {
        let (state, _) = watch::channel(ListState::default());
        Self {
            gateway,
            key: Mutex::new(key),
            generation: AtomicU64::new(0),
            state,
        }
    }

    /// First load
    pub async fn mount(&self) {
        self.reload().await;
    }

    pub fn key(&self) -> ListKey {
        self.key.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Tell the list who is viewing it; reloads only if that changed.
    ///
    /// Rows of the previous viewer are dropped before the new read starts,
    /// so a slow or failed read never shows them. Returns whether a reload
    /// happened.
    pub async fn observe(&self, key: ListKey) -> bool {
        {
            let mut current = self.key.lock().unwrap_or_else(PoisonError::into_inner);
            if *current == key {
                return false;
            }
            debug!("Viewer changed from {} to {}", current.user_id, key.user_id);
            *current = key;
            // In-flight reads belong to the old viewer
            self.generation.fetch_add(1, Ordering::SeqCst);
            self.state.send_replace(ListState::default());
        }
        self.reload().await;
        true
    }

    /// Read the rows for the current key
    pub async fn reload(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let key = self.key();

        let result = self.fetch(&key).await;

        self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != generation {
                debug!("Discarding encargos for superseded viewer {}", key.user_id);
                return false;
            }
            match result {
                Ok(encargos) => state.encargos = encargos,
                Err(e) => error!("Error fetching encargos: {}", e),
            }
            state.loading = false;
            true
        });
    }

    async fn fetch(&self, key: &ListKey) -> Result<Vec<Encargo>> {
        let rows = self.gateway.select_many(ENCARGOS_TABLE, &query_for(key)).await?;
        decode_all(rows)
    }

    pub fn state(&self) -> ListState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ListState> {
        self.state.subscribe()
    }

    pub fn view(&self) -> ListView {
        render(&self.key().role, &self.state())
    }
}

/// Action offered next to the badge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncargoAction {
    CrearCotizacion,
    VerCotizacion,
}

impl EncargoAction {
    pub fn for_viewer(role: UserRole, status: EncargoStatus) -> Option<Self> {
        match (role, status) {
            (UserRole::Vendedora, EncargoStatus::PendienteCotizacion) => Some(EncargoAction::CrearCotizacion),
            (UserRole::Comprador, EncargoStatus::CotizacionRecibida) => Some(EncargoAction::VerCotizacion),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EncargoAction::CrearCotizacion => "Crear Cotización",
            EncargoAction::VerCotizacion => "Ver Cotización",
        }
    }
}

/// One rendered encargo
#[derive(Debug, Clone, PartialEq)]
pub struct EncargoCard {
    pub id: String,
    pub product_name: String,
    pub quantity: i32,
    pub category: String,
    pub estimated_price: Option<String>,
    pub created: String,
    pub description: Option<String>,
    pub product_url: Option<String>,
    /// Buyer name, only shown to vendedoras and admins
    pub comprador: Option<String>,
    pub badge: &'static str,
    pub badge_color: BadgeColor,
    pub action: Option<EncargoAction>,
}

impl EncargoCard {
    pub fn new(role: UserRole, encargo: &Encargo) -> Self {
        let category = match encargo.category.as_deref() {
            None | Some("") => NO_CATEGORY.to_string(),
            Some(value) => Category::parse(value)
                .map(|c| c.label().to_string())
                .unwrap_or_else(|| value.to_string()),
        };

        let comprador = match role {
            UserRole::Comprador => None,
            UserRole::Vendedora | UserRole::Admin => {
                encargo.comprador.as_ref().map(|p| p.display_name().to_string())
            }
        };

        Self {
            id: encargo.id.clone(),
            product_name: encargo.product_name.clone(),
            quantity: encargo.quantity,
            category,
            estimated_price: encargo.estimated_price.clone().filter(|p| !p.is_empty()),
            created: format_date(&encargo.created_at),
            description: encargo.description.clone().filter(|d| !d.is_empty()),
            product_url: encargo.product_url.clone().filter(|u| !u.is_empty()),
            comprador,
            badge: encargo.status.label(),
            badge_color: encargo.status.badge_color(),
            action: EncargoAction::for_viewer(role, encargo.status),
        }
    }
}

/// What the list shows
#[derive(Debug, Clone, PartialEq)]
pub enum ListView {
    Loading,
    Empty { message: &'static str },
    Rows { heading: &'static str, cards: Vec<EncargoCard> },
}

pub fn render(role: &UserRole, state: &ListState) -> ListView {
    if state.loading {
        return ListView::Loading;
    }

    let is_comprador = *role == UserRole::Comprador;
    if state.encargos.is_empty() {
        let message = if is_comprador { EMPTY_COMPRADOR } else { EMPTY_OTHERS };
        return ListView::Empty { message };
    }

    ListView::Rows {
        heading: if is_comprador { HEADING_COMPRADOR } else { HEADING_OTHERS },
        cards: state.encargos.iter().map(|e| EncargoCard::new(*role, e)).collect(),
    }
}

impl fmt::Display for EncargoCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}  [{}]", self.product_name, self.badge)?;
        writeln!(f, "  Cantidad: {}", self.quantity)?;
        writeln!(f, "  Categoría: {}", self.category)?;
        if let Some(price) = &self.estimated_price {
            writeln!(f, "  Precio estimado: {}", price)?;
        }
        write!(f, "  Creado: {}", self.created)?;
        if let Some(description) = &self.description {
            write!(f, "\n  {}", description)?;
        }
        if let Some(url) = &self.product_url {
            write!(f, "\n  {} {}", PRODUCT_LINK, url)?;
        }
        if let Some(comprador) = &self.comprador {
            write!(f, "\n  Comprador: {}", comprador)?;
        }
        if let Some(action) = self.action {
            write!(f, "\n  [{}]", action.label())?;
        }
        Ok(())
    }
}

impl fmt::Display for ListView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListView::Loading => f.write_str(LOADING_TEXT),
            ListView::Empty { message } => f.write_str(message),
            ListView::Rows { heading, cards } => {
                write!(f, "{}", heading)?;
                for card in cards {
                    write!(f, "\n\n{}", card)?;
                }
                Ok(())
            }
        }
    }
}
