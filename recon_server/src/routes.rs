//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, etc.) should be expressed as
//! futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus don’t block
//! execution:
//!
//! ```nocompile
//!     async fn my_handler() -> impl Responder {
//!         tokio::time::sleep(Duration::from_secs(5)).await; // <-- Ok. Worker thread will handle other requests here
//!     }
//! ```
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use recon_engine::{
    db_types::{Actor, ActorRole, OrderId},
    order_objects::{OrderDetails, PaymentEvent, TransitionOutcome},
    traits::{CatalogCache, DiscrepancyManagement, FulfillmentStore, Notifier, OrderFlowStore, ShipmentProvider},
    DiscrepancyApi,
    FulfillmentApi,
    OrderFlowApi,
    ReconciliationError,
};

use crate::{
    auth::RequestActor,
    data_objects::{DiscrepancyQuery, JsonResponse, ResolveRequest, StatusUpdateRequest},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:expr),+])  => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(order_details => Get "/orders/{order_id}" impl OrderFlowStore, CatalogCache where requires [ActorRole::Admin, ActorRole::Brand]);
pub async fn order_details<B: OrderFlowStore, C: CatalogCache>(
    path: web::Path<String>,
    actor: RequestActor,
    api: web::Data<OrderFlowApi<B, C>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let actor = actor.into_inner();
    debug!("💻️ GET order {order_id} for {actor}");
    let details = api.order_details(&order_id).await?;
    if !actor_may_view(&actor, &details) {
        warn!("💻️ {actor} tried to view order {order_id}, which has none of their items");
        return Err(ReconciliationError::ActorNotPermitted(order_id).into());
    }
    Ok(HttpResponse::Ok().json(details))
}

/// Brands only see orders that contain at least one of their items.
fn actor_may_view(actor: &Actor, details: &OrderDetails) -> bool {
    match (actor.role, actor.brand_id.as_deref()) {
        (ActorRole::Admin, _) => true,
        (ActorRole::Brand, Some(brand)) => {
            details.items.iter().any(|i| i.brand_id == brand) ||
                details.intent.as_ref().is_some_and(|intent| intent.cart.0.iter().any(|i| i.brand_id == brand))
        },
        (ActorRole::Brand, None) => false,
    }
}

route!(update_order_status => Patch "/orders/{order_id}/status" impl OrderFlowStore, CatalogCache where requires [ActorRole::Admin, ActorRole::Brand]);
pub async fn update_order_status<B: OrderFlowStore, C: CatalogCache>(
    path: web::Path<String>,
    body: web::Json<StatusUpdateRequest>,
    actor: RequestActor,
    api: web::Data<OrderFlowApi<B, C>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let update = body.into_inner();
    let new_status = update.new_status()?;
    let actor = actor.into_inner();
    info!("💻️ {actor} is moving order {order_id} to {new_status}");
    let event = PaymentEvent::ManualStatusOverride { order_id, new_status, actor, reason: update.reason };
    match api.apply(event).await? {
        TransitionOutcome::StatusChanged(order) => Ok(HttpResponse::Ok().json(order)),
        TransitionOutcome::AlreadyApplied => {
            Ok(HttpResponse::Ok().json(JsonResponse::success(format!("The order is already {new_status}."))))
        },
        other => {
            error!("💻️ A status override produced an unexpected outcome: {other:?}");
            Err(ServerError::Unspecified("Unexpected result from status override".into()))
        },
    }
}

//----------------------------------------------   Shipments  ----------------------------------------------------
route!(retry_shipment => Post "/orders/{order_id}/shipment" impl FulfillmentStore, ShipmentProvider, Notifier, CatalogCache where requires [ActorRole::Admin]);
pub async fn retry_shipment<B, P, N, C>(
    path: web::Path<String>,
    actor: RequestActor,
    api: web::Data<FulfillmentApi<B, P, N, C>>,
) -> Result<HttpResponse, ServerError>
where
    B: FulfillmentStore,
    P: ShipmentProvider,
    N: Notifier,
    C: CatalogCache,
{
    let order_id = OrderId::from(path.into_inner());
    info!("💻️ {} requested a shipment retry for {order_id}", actor.0);
    let shipment = api.retry_shipment(&order_id).await?;
    Ok(HttpResponse::Ok().json(shipment))
}

route!(shipment_label => Get "/shipments/{id}/label" impl FulfillmentStore, ShipmentProvider, Notifier, CatalogCache where requires [ActorRole::Admin]);
pub async fn shipment_label<B, P, N, C>(
    path: web::Path<i64>,
    api: web::Data<FulfillmentApi<B, P, N, C>>,
) -> Result<HttpResponse, ServerError>
where
    B: FulfillmentStore,
    P: ShipmentProvider,
    N: Notifier,
    C: CatalogCache,
{
    let shipment_id = path.into_inner();
    debug!("💻️ GET label for shipment {shipment_id}");
    let pdf = api.generate_label(shipment_id).await?;
    Ok(pdf_response(pdf))
}

route!(shipment_manifest => Get "/shipments/{id}/manifest" impl FulfillmentStore, ShipmentProvider, Notifier, CatalogCache where requires [ActorRole::Admin]);
pub async fn shipment_manifest<B, P, N, C>(
    path: web::Path<i64>,
    api: web::Data<FulfillmentApi<B, P, N, C>>,
) -> Result<HttpResponse, ServerError>
where
    B: FulfillmentStore,
    P: ShipmentProvider,
    N: Notifier,
    C: CatalogCache,
{
    let shipment_id = path.into_inner();
    debug!("💻️ GET manifest for shipment {shipment_id}");
    let pdf = api.generate_manifest(shipment_id).await?;
    Ok(pdf_response(pdf))
}

fn pdf_response(pdf: Vec<u8>) -> HttpResponse {
    HttpResponse::Ok().content_type("application/pdf").body(pdf)
}

//----------------------------------------------   Discrepancies  ----------------------------------------------------
route!(discrepancies => Get "/discrepancies" impl DiscrepancyManagement where requires [ActorRole::Admin]);
pub async fn discrepancies<B: DiscrepancyManagement>(
    query: web::Query<DiscrepancyQuery>,
    api: web::Data<DiscrepancyApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let query = query.into_inner();
    debug!("💻️ GET discrepancies {query:?}");
    let page = api.search(query.filter(), query.pagination()).await?;
    Ok(HttpResponse::Ok().json(page))
}

route!(discrepancy_by_id => Get "/discrepancies/{id}" impl DiscrepancyManagement where requires [ActorRole::Admin]);
pub async fn discrepancy_by_id<B: DiscrepancyManagement>(
    path: web::Path<i64>,
    api: web::Data<DiscrepancyApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let discrepancy = api.fetch(id).await?;
    Ok(HttpResponse::Ok().json(discrepancy))
}

route!(resolve_discrepancy => Post "/discrepancies/{id}/resolve" impl DiscrepancyManagement where requires [ActorRole::Admin]);
pub async fn resolve_discrepancy<B: DiscrepancyManagement>(
    path: web::Path<i64>,
    body: web::Json<ResolveRequest>,
    actor: RequestActor,
    api: web::Data<DiscrepancyApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let actor = actor.into_inner();
    let resolved = api.resolve(id, &actor, &body.note).await?;
    Ok(HttpResponse::Ok().json(resolved))
}
