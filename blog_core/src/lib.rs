pub mod access;
pub mod audit;
pub mod config;
pub mod entity;
pub mod error;
pub mod ids;
pub mod listing;
pub mod mailer;
pub mod models;
pub mod service;
pub mod slug;
pub mod telemetry;
pub mod thread;

#[cfg(test)]
mod test_utils;

use std::{sync::Arc, time::Duration};

use iroh::Endpoint;
use zel_core::{prelude::RpcServerBuilder, protocol::RpcClient, IrohBundle};

use crate::{
    audit::{AuditSink, DbAuditSink},
    mailer::{Mailer, TracingMailer},
    service::{
        accounts::{AccountsClient, AccountsServer, AccountsService},
        comments::{CommentsClient, CommentsServer, CommentsService},
        contact::{ContactClient, ContactServer, ContactService},
        engagement::{EngagementClient, EngagementServer, EngagementService},
        newsletter::{NewsletterClient, NewsletterServer, NewsletterService},
        posts::{PostsClient, PostsServer, PostsService},
        taxonomy::{TaxonomyClient, TaxonomyServer, TaxonomyService},
    },
};

static ALPN: &[u8] = b"blog::0.1.0";

/// Main runtime handle: the RPC server plus typed clients connected to it.
pub struct BlogCore {
    pub config: config::BlogConfig,

    /// Server bundle that accepts inbound RPC traffic.
    pub server: IrohBundle,

    /// Client-side endpoint used to reach the local server.
    pub client_endpoint: Endpoint,

    pub posts: PostsClient,
    pub comments: CommentsClient,
    pub engagement: EngagementClient,
    pub accounts: AccountsClient,
    pub taxonomy: TaxonomyClient,
    pub newsletter: NewsletterClient,
    pub contact: ContactClient,
}

impl BlogCore {
    pub async fn start(config: config::BlogConfig) -> Result<Self, Box<dyn std::error::Error>> {
        config.validate()?;
        tracing::info!(database = %config.database_path.display(), "starting blog core");

        // ----------------
        // Server endpoint
        // ----------------
        let mut server_builder = IrohBundle::builder(Some(config.secret_key.clone())).await?;
        let server_endpoint = server_builder.endpoint().clone();

        // DB + migrations
        let db = models::open_or_create_db(&config).await?;
        models::migrate_up(&db).await?;
        access::purge_expired_sessions(&db).await?;

        let audit: Arc<dyn AuditSink> = Arc::new(DbAuditSink::new(db.clone()));
        let mailer: Arc<dyn Mailer> = Arc::new(TracingMailer);

        let accounts_service = AccountsService::new(
            db.clone(),
            config.auth,
            config.listing,
            mailer.clone(),
            audit.clone(),
        );
        accounts_service.ensure_default_roles().await?;

        let posts_service = PostsService::new(db.clone(), config.listing, audit.clone());
        let comments_service = CommentsService::new(db.clone(), config.listing);
        let engagement_service = EngagementService::new(db.clone(), config.listing, audit);
        let taxonomy_service = TaxonomyService::new(db.clone(), config.listing);
        let newsletter_service = NewsletterService::new(db, config.listing);
        let contact_service = ContactService::new(config.contact_inbox.clone(), mailer);

        // Register RPC servers
        let rpc_server_builder = RpcServerBuilder::new(ALPN, server_endpoint.clone());
        let rpc_server_builder = posts_service.register_service(rpc_server_builder);
        let rpc_server_builder = comments_service.register_service(rpc_server_builder);
        let rpc_server_builder = engagement_service.register_service(rpc_server_builder);
        let rpc_server_builder = accounts_service.register_service(rpc_server_builder);
        let rpc_server_builder = taxonomy_service.register_service(rpc_server_builder);
        let rpc_server_builder = newsletter_service.register_service(rpc_server_builder);
        let rpc_server_builder = contact_service.register_service(rpc_server_builder);
        let rpc_server = rpc_server_builder.build();

        let server = server_builder.accept(ALPN, rpc_server).finish().await;
        server.wait_online().await;
        tracing::info!("rpc server online");

        // ----------------
        // Client endpoint
        // ----------------
        let client_endpoint = Endpoint::builder()
            .secret_key(config.client_secret_key.clone())
            .alpns(vec![ALPN.to_vec()])
            .bind()
            .await?;

        client_endpoint.online().await;

        // Connect client endpoint -> server endpoint
        let conn = client_endpoint
            .connect(server.endpoint.addr(), ALPN)
            .await?;

        let posts = PostsClient::new(RpcClient::new(conn.clone()).await?);
        let comments = CommentsClient::new(RpcClient::new(conn.clone()).await?);
        let engagement = EngagementClient::new(RpcClient::new(conn.clone()).await?);
        let accounts = AccountsClient::new(RpcClient::new(conn.clone()).await?);
        let taxonomy = TaxonomyClient::new(RpcClient::new(conn.clone()).await?);
        let newsletter = NewsletterClient::new(RpcClient::new(conn.clone()).await?);
        let contact = ContactClient::new(RpcClient::new(conn).await?);

        Ok(Self {
            config,
            server,
            client_endpoint,
            posts,
            comments,
            engagement,
            accounts,
            taxonomy,
            newsletter,
            contact,
        })
    }

    pub async fn shutdown(self) -> Result<(), Box<dyn std::error::Error>> {
        // Close client endpoint
        self.client_endpoint.close().await;

        // Shutdown server bundle
        self.server.shutdown(Duration::from_secs(5)).await?;
        tracing::info!("blog core stopped");
        Ok(())
    }
}

pub mod prelude {
    pub use super::access::{Role, Viewer};
    pub use super::config;
    pub use super::entity;
    pub use super::error;
    pub use super::ids;
    pub use super::listing::{Page, PageRequest, PostCard, PostFilter};
    pub use super::models;
    pub use super::service;
    pub use super::BlogCore;

    pub use zel_core;
}
