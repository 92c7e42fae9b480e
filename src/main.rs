#[rocket::main]
async fn main() -> Result<(), rocket::Error> {
    env_logger::init();
    kindred_server::rocket().launch().await?;
    Ok(())
}
