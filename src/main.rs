#[cfg(feature = "ssr")]
use std::sync::Arc;
#[cfg(feature = "ssr")]
use xcape::backend::RelationalStore;
#[cfg(feature = "ssr")]
use xcape::config::{SiteConfig, StoreKind};

#[cfg(feature = "ssr")]
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    use actix_files::Files;
    use actix_web::*;
    use leptos::logging::log;
    use leptos::*;
    use leptos_actix::{generate_route_list, LeptosRoutes};
    use xcape::api::{self, ApiState};
    use xcape::app::*;

    let config = SiteConfig::from_env();
    let state = ApiState {
        store: open_store(&config).await?,
        default_profile_pic: config.default_profile_pic.clone(),
    };

    // Load configuration
    let conf = get_configuration(None)
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    let addr = conf.leptos_options.site_addr;

    // Generate the list of routes in your Leptos App
    let routes = generate_route_list(App);
    log!("[SERVER] listening on http://{}", &addr);

    HttpServer::new(move || {
        let leptos_options = &conf.leptos_options;
        let site_root = &leptos_options.site_root;

        App::new()
            .app_data(web::Data::new(state.clone()))
            // Register custom API routes BEFORE Leptos server functions
            .configure(api::configure)
            .route("/api/{tail:.*}", leptos_actix::handle_server_fns())
            // Serve JS/WASM/CSS from `pkg`
            .service(Files::new("/pkg", format!("{site_root}/pkg")))
            // Serve other assets from the `assets` directory
            .service(Files::new("/assets", site_root))
            .service(favicon)
            .leptos_routes(leptos_options.to_owned(), routes.to_owned(), App)
            .app_data(web::Data::new(leptos_options.to_owned()))
    })
    .bind(&addr)?
    .run()
    .await
}

#[cfg(feature = "ssr")]
async fn open_store(
    config: &SiteConfig,
) -> std::io::Result<Arc<dyn RelationalStore + Send + Sync>> {
    use leptos::logging::log;
    use xcape::backend::supabase::{SupabaseClient, SupabaseStore};
    use xcape::db::Database;

    match &config.store {
        StoreKind::Supabase => {
            log!("[SERVER] Reading reviews from {}", config.supabase_url);
            Ok(Arc::new(SupabaseStore::new(SupabaseClient::new(config))))
        }
        StoreKind::Sqlite { path } => {
            let db = Database::new(path).map_err(std::io::Error::other)?;
            db.create_schema().await.map_err(std::io::Error::other)?;
            log!("[SERVER] Schema ready in {}", path);
            Ok(Arc::new(db))
        }
    }
}

#[cfg(feature = "ssr")]
#[actix_web::get("favicon.ico")]
async fn favicon(
    leptos_options: actix_web::web::Data<leptos::LeptosOptions>,
) -> actix_web::Result<actix_files::NamedFile> {
    let leptos_options = leptos_options.into_inner();
    let site_root = &leptos_options.site_root;
    Ok(actix_files::NamedFile::open(format!(
        "{site_root}/favicon.ico"
    ))?)
}

#[cfg(not(any(feature = "ssr", feature = "csr")))]
pub fn main() {
    // no client-side main function
    // see lib.rs for hydration function instead
}

#[cfg(all(not(feature = "ssr"), feature = "csr"))]
pub fn main() {
    // to run: `trunk serve --open --features csr`
    use xcape::app::*;

    console_error_panic_hook::set_once();

    leptos::mount_to_body(App);
}
