pub mod admin_token;
pub mod server;

// Keeps the match over every `Action` out of this file.
mod run;

#[derive(Debug)]
pub enum Action {
    Server(server::Args),
    AdminToken(admin_token::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
