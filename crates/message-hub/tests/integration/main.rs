// Integration test suite for the message hub.
//
// Organized into focused modules by feature area. Each module shares
// common::TestClient for DB lifecycle management and common::bearer_token
// for JWT-authenticated requests.

mod common;

mod edit_delete;
mod incoming_webhooks;
mod messages;
mod participants;
mod reactions;
mod read_positions;
mod retention;
mod rooms;
mod search;
mod system;
mod validation;
mod webhooks;
