use axum::{handler::Handler, routing::get, routing::post, Router};

pub fn main_router<STATE>(components: Vec<(String, Router<STATE>)>, state: STATE) -> Router
where
    STATE: Clone + Send + Sync + 'static,
{
    let mut app = Router::<STATE>::new();

    for (_, router) in components {
        app = app.merge(router);
    }

    app.with_state(state)
}

pub fn get_router_builder<T, S>(
    path: String,
    handler: impl Handler<T, S> + Clone + Send + 'static,
) -> (String, Router<S>)
where
    T: 'static,
    S: Clone + Send + Sync + 'static,
{
    let app = Router::<S>::new().route(&path, get(handler));
    (path, app)
}

pub fn post_router_builder<T, S>(
    path: String,
    handler: impl Handler<T, S> + Clone + Send + 'static,
) -> (String, Router<S>)
where
    T: 'static,
    S: Clone + Send + Sync + 'static,
{
    let app = Router::<S>::new().route(&path, post(handler));
    (path, app)
}
