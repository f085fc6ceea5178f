pub mod agents;
pub mod calls;
pub mod vapi;

pub async fn health() -> &'static str {
    "OK"
}
