mod address;
mod cipher;

pub use address::{Scheme, http_base_url, normalize_url, normalize_url_with};
pub use cipher::xor_obfuscate;
