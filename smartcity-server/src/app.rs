use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use smartcity_api::models::SystemStatus;
use smartcity_api::paths::StorePaths;
use smartcity_api::store::{self, StateStore, StoreBackend, StoreError};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::configs::Settings;
use crate::handles::*;
use crate::services::{
    DashboardHandle, DashboardOptions, DashboardService, DisplayView, EventBus, OpenWeatherMap,
    ProjectorService, StoreBridge, WeatherProvider, WeatherService,
};

/// Running services behind the router.
pub struct App {
    pub router: Router,
    pub dashboard: DashboardHandle,
    pub event_bus: Arc<EventBus>,
    pub view: Arc<RwLock<DisplayView>>,
}

pub async fn create_app(settings: &Arc<Settings>) -> Result<Router, StoreError> {
    let store = store::connect(&settings.store)?;

    if matches!(settings.store.backend, StoreBackend::Memory) {
        // Nothing else can reach an in-process store to report the system online.
        let paths = StorePaths::new(&settings.store.root);
        store
            .write_whole(&paths.status(), serde_json::to_value(SystemStatus::online())?)
            .await?;
    }

    let weather = settings.weather.as_ref().map(|weather| {
        Arc::new(OpenWeatherMap::new(&weather.url, &weather.api_key)) as Arc<dyn WeatherProvider>
    });

    Ok(start_app(store, settings, weather).await?.router)
}

/// Wires the services together and spawns their tasks.
pub async fn start_app(
    store: Arc<dyn StateStore>,
    settings: &Settings,
    weather: Option<Arc<dyn WeatherProvider>>,
) -> Result<App, StoreError> {
    let paths = StorePaths::new(&settings.store.root);
    let event_bus = Arc::new(EventBus::new());
    let view = Arc::new(RwLock::new(DisplayView::new()));

    ProjectorService::new(view.clone(), event_bus.clone())
        .start()
        .await;

    let (mut dashboard_service, inbox) = DashboardService::new(
        store.clone(),
        paths.clone(),
        event_bus.clone(),
        DashboardOptions {
            rules: settings.rules,
            seed: settings.seed.clone(),
            alert_period: Duration::from_secs(settings.dashboard.alert_period),
            cascade_zone: settings.dashboard.cascade_zone.clone(),
        },
    )
    .await;
    dashboard_service.hydrate().await;

    StoreBridge::new(store, paths, event_bus.clone())
        .start()
        .await?;

    let (dashboard, commands) = DashboardHandle::channel(100);
    tokio::spawn(dashboard_service.run(inbox, commands));

    let weather_service = match (weather, &settings.weather) {
        (Some(provider), Some(config)) => {
            let service = Arc::new(WeatherService::new(provider, config.city.clone(), event_bus.clone()));
            if let Some(refresh) = config.refresh {
                service.clone().start_refresh(Duration::from_secs(refresh));
            }
            Some(service)
        }
        _ => None,
    };

    let router = Router::new()
        .merge(device_router(DeviceState {
            dashboard: dashboard.clone(),
        }))
        .merge(rule_router(RuleState {
            dashboard: dashboard.clone(),
        }))
        .merge(alert_router(AlertState {
            dashboard: dashboard.clone(),
        }))
        .merge(display_router(DisplayState {
            view: view.clone(),
            event_bus: event_bus.clone(),
        }))
        .merge(weather_router(WeatherState { weather_service }))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    Ok(App {
        router,
        dashboard,
        event_bus,
        view,
    })
}
