use std::time::Duration;

use aws_sdk_s3::{
    config::{timeout::TimeoutConfig, Region},
    primitives::ByteStream,
    types::{BucketLocationConstraint, CreateBucketConfiguration},
    Client,
};
use log::debug;
use tokio::runtime::Runtime;

use crate::{Adapter, Engine, JsonCodec, KvError, Lookup, Result};

/// Options for [S3Engine].
#[derive(Debug, Clone)]
pub struct S3Options<C = JsonCodec> {
    /// Bucket the objects are stored in. Required.
    pub bucket: String,
    /// Default is `us-east-1`.
    pub region: String,
    /// Endpoint of an S3-compatible store, e.g. `http://localhost:9000`.
    pub endpoint: Option<String>,
    /// Address buckets by path instead of by subdomain. Needed by most
    /// self-hosted stores. Default is `false`.
    pub force_path_style: bool,
    /// Create the bucket if it does not exist. Default is `false`.
    pub create_bucket: bool,
    /// Timeout of every operation. Default is 30 seconds.
    pub timeout: Duration,
    /// Codec of the store.
    pub codec: C,
}

impl<C: Default> Default for S3Options<C> {
    fn default() -> Self {
        S3Options {
            bucket: String::new(),
            region: String::from("us-east-1"),
            endpoint: None,
            force_path_style: false,
            create_bucket: false,
            timeout: Duration::from_secs(30),
            codec: C::default(),
        }
    }
}

/// Stores every key as one object of an S3 bucket.
///
/// Credentials come from the standard AWS provider chain. Calls block on
/// a runtime owned by the engine.
pub struct S3Engine {
    client: Client,
    bucket: String,
    runtime: Runtime,
}

fn s3_error<E: std::error::Error + Send + Sync + 'static>(err: E) -> KvError {
    KvError::S3(Box::new(err))
}

impl S3Engine {
    /// Connect to the bucket described by `options` and return a store over it.
    pub fn open<C>(options: S3Options<C>) -> Result<Adapter<Self, C>> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;

        let region = Region::new(options.region.clone());
        let sdk_config = runtime.block_on(
            aws_config::defaults(aws_config::BehaviorVersion::latest())
                .region(region)
                .load(),
        );
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(options.force_path_style)
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(options.timeout)
                    .build(),
            );
        if let Some(endpoint) = &options.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        let engine = S3Engine {
            client: Client::from_conf(builder.build()),
            bucket: options.bucket,
            runtime,
        };
        debug!("Connected to S3 bucket {}", engine.bucket);

        if options.create_bucket {
            engine.ensure_bucket(&options.region)?;
        }
        Ok(Adapter::new(engine, options.codec))
    }

    /// The SDK client, for operations outside the store contract.
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn ensure_bucket(&self, region: &str) -> Result<()> {
        self.runtime.block_on(async {
            match self.client.head_bucket().bucket(&self.bucket).send().await {
                Ok(_) => return Ok(()),
                Err(err) if err.as_service_error().map_or(false, |e| e.is_not_found()) => {}
                Err(err) => return Err(s3_error(err)),
            }

            debug!("Creating S3 bucket {}", self.bucket);
            let mut request = self.client.create_bucket().bucket(&self.bucket);
            // us-east-1 is the implicit location and must not be named
            if region != "us-east-1" {
                request = request.create_bucket_configuration(
                    CreateBucketConfiguration::builder()
                        .location_constraint(BucketLocationConstraint::from(region))
                        .build(),
                );
            }
            request.send().await.map_err(s3_error)?;
            Ok(())
        })
    }
}

impl Engine for S3Engine {
    fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.runtime.block_on(async {
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(ByteStream::from(value))
                .send()
                .await
                .map_err(s3_error)?;
            Ok::<_, KvError>(())
        })
    }

    fn get(&self, key: &str) -> Result<Lookup<Vec<u8>>> {
        self.runtime.block_on(async {
            let output = match self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
            {
                Ok(output) => output,
                Err(err) if err.as_service_error().map_or(false, |e| e.is_no_such_key()) => {
                    return Ok(Lookup::Miss)
                }
                Err(err) => return Err(s3_error(err)),
            };
            let data = output.body.collect().await.map_err(s3_error)?;
            Ok(Lookup::Hit(data.into_bytes().to_vec()))
        })
    }

    fn delete(&self, key: &str) -> Result<()> {
        // S3 reports success for missing objects
        self.runtime.block_on(async {
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map_err(s3_error)?;
            Ok::<_, KvError>(())
        })
    }

    fn close(self) -> Result<()> {
        debug!("Closing S3 client for bucket {}", self.bucket);
        Ok(())
    }
}
