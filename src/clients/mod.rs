pub mod crtsh;
pub mod otx;
pub mod shodan;
pub mod virustotal;

pub use crtsh::CrtshClient;
pub use otx::OtxClient;
pub use shodan::ShodanClient;
pub use virustotal::VirusTotalClient;
