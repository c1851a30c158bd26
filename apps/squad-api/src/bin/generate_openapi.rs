//! Dumps the OpenAPI document to `specs/squad-api.json`.

use utoipa::OpenApi;

fn main() {
    let out =
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../specs/squad-api.json");

    let spec = squad_api::routes::ApiDoc::openapi()
        .to_pretty_json()
        .expect("serialize OpenAPI document");

    std::fs::create_dir_all(out.parent().expect("spec path has a parent"))
        .expect("create specs directory");
    std::fs::write(&out, spec).expect("write OpenAPI document");

    println!("Wrote {}", out.display());
}
