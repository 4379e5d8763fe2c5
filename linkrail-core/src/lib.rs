#[macro_use]
mod error;
pub use error::{AnyError, AnyResult};

pub mod cancel;
pub mod config;
pub mod http;
pub mod resource;
pub mod stream;
pub mod uri;

use figlet_rs::FIGfont;

pub fn print_logo() {
    let standard_font = FIGfont::standard().unwrap();
    if let Some(figure) = standard_font.convert("Linkrail") {
        println!("{}", figure);
    }
}
