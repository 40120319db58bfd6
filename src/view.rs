//! Role-gated rendering of the root component

use std::fmt;

use crate::bootstrap::AuthState;
use crate::models::UserRole;

pub const APP_TITLE: &str = "Importz";
pub const LOADING_TEXT: &str = "Cargando...";
pub const SIGN_IN_LABEL: &str = "Iniciar sesión con Google";
pub const SIGN_OUT_LABEL: &str = "Cerrar sesión";
pub const WELCOME_TITLE: &str = "¡Bienvenido a Importz!";
pub const WELCOME_BODY: &str =
    "Funcionalidad principal en desarrollo. Este es el punto de partida para tu plataforma de encargos.";

/// What the root component shows
#[derive(Debug, Clone, PartialEq)]
pub enum View {
    /// Session still resolving
    Loading,
    /// No user; offer Google sign-in
    SignIn,
    Dashboard(Dashboard),
}

/// Signed-in layout
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    /// Profile full name, else the user's email
    pub display_name: String,
    /// Shown as a badge when the profile is known
    pub role: Option<UserRole>,
    /// Exactly one panel once the profile is known, none before
    pub panel: Option<RolePanel>,
}

/// The role-specific card under the welcome message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolePanel {
    Comprador,
    Vendedora,
    Admin,
}

impl RolePanel {
    pub fn for_role(role: UserRole) -> Self {
        match role {
            UserRole::Comprador => RolePanel::Comprador,
            UserRole::Vendedora => RolePanel::Vendedora,
            UserRole::Admin => RolePanel::Admin,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            RolePanel::Comprador => "Panel de Comprador",
            RolePanel::Vendedora => "Panel de Vendedora",
            RolePanel::Admin => "Panel de Administrador",
        }
    }

    pub fn body(&self) -> &'static str {
        match self {
            RolePanel::Comprador => "Aquí podrás crear y gestionar tus encargos.",
            RolePanel::Vendedora => "Aquí podrás ver encargos y crear cotizaciones.",
            RolePanel::Admin => "Aquí podrás gestionar usuarios y el sistema.",
        }
    }
}

/// Pick the view for a state
pub fn render(state: &AuthState) -> View {
    if state.loading {
        return View::Loading;
    }

    let user = match &state.user {
        Some(user) => user,
        None => return View::SignIn,
    };

    let display_name = state
        .profile
        .as_ref()
        .and_then(|p| p.full_name.clone())
        .filter(|name| !name.is_empty())
        .or_else(|| user.email.clone())
        .unwrap_or_default();
    let role = state.role();

    View::Dashboard(Dashboard {
        display_name,
        role,
        panel: role.map(RolePanel::for_role),
    })
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::Loading => write!(f, "{}", LOADING_TEXT),
            View::SignIn => {
                writeln!(f, "{}", APP_TITLE)?;
                write!(f, "[{}]", SIGN_IN_LABEL)
            }
            View::Dashboard(dashboard) => {
                write!(f, "{} | {}", APP_TITLE, dashboard.display_name)?;
                if let Some(role) = dashboard.role {
                    write!(f, " ({})", role)?;
                }
                writeln!(f, " [{}]", SIGN_OUT_LABEL)?;
                writeln!(f)?;
                writeln!(f, "{}", WELCOME_TITLE)?;
                write!(f, "{}", WELCOME_BODY)?;
                if let Some(panel) = dashboard.panel {
                    write!(f, "\n\n{}\n{}", panel.title(), panel.body())?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{decode, fake};

    fn signed_in(role: Option<&str>, full_name: Option<&str>) -> AuthState {
        AuthState {
            loading: false,
            user: Some(fake::user("u1", "ana@example.com", full_name)),
            profile: role.map(|role| decode(fake::profile_row("u1", "ana@example.com", full_name, role)).unwrap()),
        }
    }

    #[test]
    fn loading_wins() {
        let mut state = signed_in(Some("admin"), None);
        state.loading = true;
        assert_eq!(render(&state), View::Loading);
        assert_eq!(render(&AuthState::default()), View::Loading);
    }

    #[test]
    fn anonymous_gets_sign_in() {
        let state = AuthState {
            loading: false,
            ..Default::default()
        };
        let view = render(&state);
        assert_eq!(view, View::SignIn);
        assert!(view.to_string().contains("Iniciar sesión con Google"));
    }

    #[test]
    fn each_role_gets_exactly_its_panel() {
        let expected = [
            ("comprador", "Panel de Comprador"),
            ("vendedora", "Panel de Vendedora"),
            ("admin", "Panel de Administrador"),
        ];
        for (role, title) in expected {
            let text = render(&signed_in(Some(role), Some("Ana"))).to_string();
            assert!(text.contains(title), "{} missing in {}", title, text);
            assert_eq!(text.matches("Panel de").count(), 1);
            assert!(text.contains(&format!("({})", role)));
        }
    }

    #[test]
    fn no_profile_no_panel() {
        match render(&signed_in(None, None)) {
            View::Dashboard(dashboard) => {
                assert_eq!(dashboard.display_name, "ana@example.com");
                assert_eq!(dashboard.role, None);
                assert_eq!(dashboard.panel, None);
            }
            other => panic!("unexpected view {:?}", other),
        }
    }

    #[test]
    fn blank_full_name_falls_back_to_email() {
        match render(&signed_in(Some("vendedora"), Some(""))) {
            View::Dashboard(dashboard) => assert_eq!(dashboard.display_name, "ana@example.com"),
            other => panic!("unexpected view {:?}", other),
        }
        match render(&signed_in(Some("vendedora"), Some("Ana"))) {
            View::Dashboard(dashboard) => assert_eq!(dashboard.display_name, "Ana"),
            other => panic!("unexpected view {:?}", other),
        }
    }
}
