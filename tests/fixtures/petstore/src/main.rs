//! @title Petstore API
//! @version 1.0
//! @description Pets and the people who look after them.
//! @host petstore.example.com
//! @basePath /api/v1
//! @schemes https
//!
//! @tag.name pets
//! @tag.description Everything about pets
//!
//! @securityDefinitions.apikey ApiKeyAuth
//! @in header
//! @name Authorization

mod handlers;
mod models;

fn main() {
    println!("petstore");
}
