pub mod key_provisioning_service;

pub use key_provisioning_service::KeyProvisioner;
