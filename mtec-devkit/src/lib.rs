/*!
# M-TEC Bridge DevKit - stubs for testing the bridge without hardware

- Register reader mock with programmable readings and failure injection
- Publisher mock recording every topic/payload
- Discovery mock counting announcements
- Complete reading fixtures per category and a test harness
*/

pub mod discovery_stub;
pub mod fixtures;
pub mod mqtt_stub;
pub mod reader_stub;
pub mod test_utils;

pub use discovery_stub::MockDiscovery;
pub use mqtt_stub::{MockMessage, MockPublisher};
pub use reader_stub::MockRegisterReader;
pub use test_utils::TestHarness;
