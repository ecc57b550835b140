use lazy_static::lazy_static;
use std::sync::Arc;
use testcontainers::{clients::Cli, Container};
use testcontainers_modules::postgres::Postgres;
use tokio_postgres::{Client, NoTls};

pub const MD5_RANKED: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
pub const MD5_APPROVED: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
pub const MD5_PENDING: &str = "cccccccccccccccccccccccccccccccc";

pub struct TestDatabase {
    pub connection_string: String,
    _container: Container<'static, Postgres>
}

impl TestDatabase {
    pub async fn new() -> Result<Self, Box<dyn std::error::Error>> {
        // Create a static CLI instance
        lazy_static! {
            static ref DOCKER: Arc<Cli> = Arc::new(Cli::default());
        }

        let container = DOCKER.run(Postgres::default());
        let port = container.get_host_port_ipv4(5432);

        let connection_string = format!(
            "host=localhost port={} user=postgres password=postgres dbname=postgres",
            port
        );

        let client = Self::connect(&connection_string).await?;
        client.batch_execute(include_str!("schema.sql")).await?;

        Ok(TestDatabase {
            connection_string,
            _container: container
        })
    }

    async fn connect(connection_string: &str) -> Result<Client, Box<dyn std::error::Error>> {
        let (client, connection) = tokio_postgres::connect(connection_string, NoTls).await?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                eprintln!("Database connection error: {}", e);
            }
        });

        Ok(client)
    }

    pub async fn get_client(&self) -> Result<Client, Box<dyn std::error::Error>> {
        Self::connect(&self.connection_string).await
    }

    /// Three users, three maps (ranked, approved, pending) and a mix of
    /// best / submitted scores in vn!std and rx!std.
    pub async fn seed_test_data(&self) -> Result<(), Box<dyn std::error::Error>> {
        let client = self.get_client().await?;

        client
            .batch_execute(&format!(
                "INSERT INTO users (id, name, country, priv) VALUES
                 (3, 'Unrestricted', 'gb', 3),
                 (4, 'Restricted', 'us', 2),
                 (5, 'NoScores', 'de', 3);

                 INSERT INTO maps (id, md5, status, mode, pp100) VALUES
                 (100, '{ranked}', 2, 0, NULL),
                 (101, '{approved}', 3, 1, 250.5),
                 (102, '{pending}', 0, 0, NULL);

                 INSERT INTO stats (id, mode) VALUES
                 (3, 0), (3, 4), (4, 0), (5, 0);",
                ranked = MD5_RANKED,
                approved = MD5_APPROVED,
                pending = MD5_PENDING
            ))
            .await?;

        let scores: [(i64, &str, i32, i32, i32, f64, f64); 7] = [
            (1, MD5_RANKED, 3, 0, 2, 300.0, 85.0),
            (2, MD5_APPROVED, 3, 0, 2, 500.0, 95.0),
            (3, MD5_RANKED, 3, 0, 1, 450.0, 99.0),
            (4, MD5_PENDING, 3, 0, 2, 999.0, 100.0),
            (5, MD5_RANKED, 3, 4, 2, 400.0, 90.0),
            (6, MD5_APPROVED, 4, 0, 2, 120.0, 91.0),
            (7, MD5_RANKED, 3, 0, 2, 300.0, 70.0)
        ];

        for (id, md5, user_id, mode, status, pp, acc) in scores {
            client
                .execute(
                    "INSERT INTO scores (id, map_md5, userid, mode, status, pp, acc, max_combo, n300, nmiss)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, 500, 480, 2)",
                    &[&id, &md5, &user_id, &mode, &status, &pp, &acc]
                )
                .await?;
        }

        Ok(())
    }
}
