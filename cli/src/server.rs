//! HTTP trigger for the agent service.

use clap::Args;
use researchdeck::{AgentService, ReportBuilder, Settings};
use tide::{Body, Request, Response};

/// Route receiving research from the caller.
pub const TRIGGER_ROUTE: &str = "/api/agent_httptrigger";

/// Options for `researchdeck serve`.
#[derive(Clone, Debug, Args)]
pub struct ServeOptions {
    /// The port where the trigger should be served.
    #[arg(short, long, env = "PORT", default_value = "7071")]
    pub port: u16,

    #[command(flatten)]
    pub settings: Settings,
}

impl ServeOptions {
    /// Open storage, load the template and serve until the listener fails.
    pub async fn serve(&self) -> tide::Result<()> {
        let storage = self.settings.open_storage().await?;
        let builder = match self.settings.load_template() {
            Ok(bytes) => ReportBuilder::new(bytes),
            Err(err) => {
                tracing::warn!(%err, "falling back to the built-in starter template");
                ReportBuilder::new(researchdeck::starter_template()?)
            }
        };
        let service = AgentService::new(builder, storage, self.settings.thread_timeout());

        let mut app = tide::with_state(service);
        app.at(TRIGGER_ROUTE).get(agent_trigger).post(agent_trigger);
        app.at("/health").get(|_| async { Ok("ok") });

        tracing::info!(port = self.port, route = TRIGGER_ROUTE, "serving agent trigger");
        app.listen(format!("0.0.0.0:{}", self.port)).await?;
        Ok(())
    }
}

async fn agent_trigger(mut req: Request<AgentService>) -> tide::Result {
    let body = req.body_bytes().await?;
    let res = req.state().handle(&body).await;
    Ok(Response::builder(res.status)
        .body(Body::from_json(&res.body)?)
        .build())
}
