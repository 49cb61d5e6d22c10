use rocket::Route;

mod elections;
mod races;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(elections::routes());
    routes.extend(races::routes());
    routes.extend(voting::routes());
    routes
}
