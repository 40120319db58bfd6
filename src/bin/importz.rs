use clap::{Arg, ArgMatches, Command};
use log::error;
use std::process;
use std::sync::Arc;

use importz::auth::Session;
use importz::bootstrap::AuthView;
use importz::encargos::{CreateEncargoForm, EncargoCard, EncargoList, FormField, ListKey};
use importz::error::{Error, Result};
use importz::prelude::*;
use url::Url;

fn refresh_token_arg() -> Arg<'static> {
    Arg::new("refresh-token")
        .long("refresh-token")
        .short('r')
        .value_name("TOKEN")
        .env("IMPORTZ_REFRESH_TOKEN")
        .help("Refresh token of the session to act as")
        .takes_value(true)
        .required(true)
}

fn field_arg(field: FormField, long: &'static str) -> Arg<'static> {
    Arg::new(field.name())
        .long(long)
        .value_name("VALUE")
        .help(field.label())
        .takes_value(true)
}

fn cli() -> Command<'static> {
    Command::new("importz")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Importz encargos from the command line")
        .subcommand_required(true)
        .subcommand(Command::new("login-url").about("Print the Google sign-in URL"))
        .subcommand(
            Command::new("callback")
                .about("Finish sign-in from the URL the browser was sent back to")
                .arg(Arg::new("url").value_name("URL").required(true))
                .arg(
                    Arg::new("code-verifier")
                        .long("code-verifier")
                        .value_name("VERIFIER")
                        .env("IMPORTZ_CODE_VERIFIER")
                        .help("Verifier printed by login-url")
                        .takes_value(true),
                ),
        )
        .subcommand(
            Command::new("dashboard")
                .about("Show the dashboard of the signed-in user")
                .arg(refresh_token_arg()),
        )
        .subcommand(
            Command::new("encargos")
                .about("List the encargos visible to the signed-in user")
                .arg(refresh_token_arg()),
        )
        .subcommand(
            Command::new("crear")
                .about("Create an encargo as the signed-in comprador")
                .arg(refresh_token_arg())
                .arg(field_arg(FormField::ProductName, "producto").required(true))
                .arg(field_arg(FormField::ProductUrl, "url"))
                .arg(field_arg(FormField::Quantity, "cantidad"))
                .arg(field_arg(FormField::Description, "descripcion"))
                .arg(field_arg(FormField::EstimatedPrice, "precio"))
                .arg(field_arg(FormField::Category, "categoria")),
        )
}

#[tokio::main]
async fn main() {
    pretty_env_logger::init();

    let matches = cli().get_matches();
    if let Err(e) = run(&matches).await {
        error!("{}", e);
        eprintln!("{}", e);
        process::exit(1);
    }
}

async fn run(matches: &ArgMatches) -> Result<()> {
    let config = Config::from_env()?;
    let supabase = Arc::new(Supabase::from_config(&config));

    match matches.subcommand() {
        Some(("login-url", _)) => {
            let view = AuthView::mount(supabase.clone(), config.callback_url());
            let url = view
                .sign_in_with_google()
                .await
                .ok_or_else(|| Error::auth("Could not start Google sign-in"))?;
            println!("{}", url);
            if let Some(verifier) = supabase.auth().code_verifier() {
                println!("code verifier: {}", verifier);
            }
        }
        Some(("callback", args)) => {
            let verifier = args.get_one::<String>("code-verifier").map(String::as_str);
            let session = finish_sign_in(&supabase, required(args, "url")?, verifier).await?;
            println!("Sesión iniciada como {}", session.user.email.unwrap_or(session.user.id));
            println!("refresh token: {}", session.refresh_token);
        }
        Some(("dashboard", args)) => {
            let view = signed_in(&supabase, args).await?;
            println!("{}", view.view());
        }
        Some(("encargos", args)) => {
            let view = signed_in(&supabase, args).await?;
            let key = list_key(&view.loaded().await)?;
            let list = EncargoList::new(supabase.clone(), key);
            list.mount().await;
            println!("{}", list.view());
        }
        Some(("crear", args)) => {
            let view = signed_in(&supabase, args).await?;
            let state = view.loaded().await;
            let user = state.user.ok_or_else(|| Error::auth("Not logged in"))?;

            let form = CreateEncargoForm::new(user.id);
            for field in FormField::ALL {
                if let Some(value) = args.get_one::<String>(field.name()) {
                    form.set_field(field, value);
                }
            }

            match form.submit(supabase.as_ref()).await {
                Ok(encargo) => {
                    let role = state.profile.map(|p| p.role).unwrap_or_default();
                    println!("{}", EncargoCard::new(role, &encargo));
                }
                Err(e) => {
                    if let Some(alert) = e.alert() {
                        eprintln!("{}", alert);
                    }
                    return Err(Error::general(e));
                }
            }
        }
        _ => unreachable!("subcommand is required"),
    }

    Ok(())
}

fn required<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a str> {
    args.get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| Error::general(format!("Missing argument {}", name)))
}

/// Start the session from a refresh token and wait for the profile
async fn signed_in(supabase: &Arc<Supabase>, args: &ArgMatches) -> Result<AuthView<Supabase>> {
    supabase
        .auth()
        .restore_session(required(args, "refresh-token")?)
        .await?;
    let view = AuthView::mount(supabase.clone(), "");
    view.loaded().await;
    Ok(view)
}

/// PKCE callbacks carry `?code=`, implicit-flow ones a `#access_token=` fragment
async fn finish_sign_in(supabase: &Supabase, callback_url: &str, verifier: Option<&str>) -> Result<Session> {
    let url = Url::parse(callback_url)?;
    let code = url
        .query_pairs()
        .find(|(key, _)| key == "code")
        .map(|(_, value)| value.into_owned());

    match code {
        Some(code) => {
            let verifier = verifier.ok_or_else(|| Error::auth("A code callback needs --code-verifier"))?;
            supabase.auth().exchange_code_with_verifier(&code, verifier).await
        }
        None => supabase.auth().set_session_from_url(callback_url).await,
    }
}

fn list_key(state: &AuthState) -> Result<ListKey> {
    match (&state.user, &state.profile) {
        (Some(user), Some(profile)) => Ok(ListKey::new(profile.role, user.id.clone())),
        (Some(_), None) => Err(Error::general("Profile could not be loaded")),
        (None, _) => Err(Error::auth("Not logged in")),
    }
}
