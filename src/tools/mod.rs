//! Named, schema-described operations over the pricing resolvers.
//!
//! Every tool takes a JSON object and returns a JSON object. Input schemas are
//! generated from the request types, so `list()` always matches what `call()`
//! accepts.
//!
//! # Usage
//!
//! ```rust,ignore
//! let tools = ToolRegistry::new(catalog, classifier)?;
//! let estimate = tools
//!     .call("estimate_openai_cost", json!({"model": "gpt-4o", "input_tokens": 1000, "output_tokens": 500}))
//!     .await?;
//! ```

mod args;
mod error;

use std::{collections::BTreeMap, sync::Arc};

pub(crate) use args::first_invalid_field;
use args::ArgumentSchema;
pub use error::ToolError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::{
    catalog::CatalogRegistry,
    classifier::TaskClassifier,
    resolvers::{
        ResolveError, ai, bandwidth, breakeven, catalog, compute, forecast, not_blank, runway,
        saas,
    },
};

/// Classify a free-text task description.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ClassifyTaskRequest {
    /// What the task is, e.g. "transcribe support calls"
    #[validate(length(min = 1, max = 4000), custom(function = "not_blank"))]
    pub text: String,
}

/// A tool as advertised to callers.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

struct ToolDef {
    name: &'static str,
    description: &'static str,
    schema: fn() -> Result<ArgumentSchema, String>,
}

const TOOLS: &[ToolDef] = &[
    ToolDef {
        name: "estimate_openai_cost",
        description: "Cost of a request to an OpenAI model, with cheaper same-provider alternatives.",
        schema: ArgumentSchema::for_type::<ai::TokenCostRequest>,
    },
    ToolDef {
        name: "estimate_anthropic_cost",
        description: "Cost of a request to an Anthropic model, with cheaper same-provider alternatives.",
        schema: ArgumentSchema::for_type::<ai::TokenCostRequest>,
    },
    ToolDef {
        name: "estimate_model_cost",
        description: "Cost of a request to any catalog model (openai, anthropic, openrouter).",
        schema: ArgumentSchema::for_type::<ai::ModelCostRequest>,
    },
    ToolDef {
        name: "compare_ai_models",
        description: "Rank catalog models by cost for a token volume, optionally by task category.",
        schema: ArgumentSchema::for_type::<ai::CompareModelsRequest>,
    },
    ToolDef {
        name: "recommend_ai_model",
        description: "Classify a task description and recommend the cheapest suitable models.",
        schema: ArgumentSchema::for_type::<ai::RecommendModelRequest>,
    },
    ToolDef {
        name: "classify_task",
        description: "Classify a task description into a model task category.",
        schema: ArgumentSchema::for_type::<ClassifyTaskRequest>,
    },
    ToolDef {
        name: "estimate_compute_cost",
        description: "Hourly, monthly and yearly cost of cloud instances, with reserved pricing.",
        schema: ArgumentSchema::for_type::<compute::ComputeCostRequest>,
    },
    ToolDef {
        name: "calculate_reserved_savings",
        description: "One- and three-year reserved savings for an on-demand monthly spend.",
        schema: ArgumentSchema::for_type::<compute::ReservedSavingsRequest>,
    },
    ToolDef {
        name: "compare_compute_providers",
        description: "Cheapest instance per provider meeting vCPU and memory minimums.",
        schema: ArgumentSchema::for_type::<compute::CompareComputeRequest>,
    },
    ToolDef {
        name: "estimate_storage_cost",
        description: "Monthly object storage cost for a provider's storage class.",
        schema: ArgumentSchema::for_type::<compute::StorageCostRequest>,
    },
    ToolDef {
        name: "estimate_bandwidth_cost",
        description: "Tiered egress cost with a per-tier breakdown.",
        schema: ArgumentSchema::for_type::<bandwidth::BandwidthCostRequest>,
    },
    ToolDef {
        name: "calculate_break_even",
        description: "Months until two upfront/monthly cost options break even.",
        schema: ArgumentSchema::for_type::<breakeven::BreakEvenRequest>,
    },
    ToolDef {
        name: "forecast_costs",
        description: "Compounding monthly cost forecast with step changes and cost-cliff detection.",
        schema: ArgumentSchema::for_type::<forecast::ForecastRequest>,
    },
    ToolDef {
        name: "calculate_runway",
        description: "Cash runway, burn multiple and projected cash-out date.",
        schema: ArgumentSchema::for_type::<runway::RunwayRequest>,
    },
    ToolDef {
        name: "recommend_saas_tier",
        description: "Cheapest plan of a SaaS service covering the given usage.",
        schema: ArgumentSchema::for_type::<saas::SaasTierRequest>,
    },
    ToolDef {
        name: "compare_saas_services",
        description: "Best-fitting plan of every service in a SaaS category, cheapest first.",
        schema: ArgumentSchema::for_type::<saas::CompareSaasRequest>,
    },
    ToolDef {
        name: "list_pricing_catalog",
        description: "Providers, models, instances and services in the price catalog.",
        schema: ArgumentSchema::for_type::<catalog::CatalogListingRequest>,
    },
];

fn respond<T: Serialize>(result: Result<T, ResolveError>) -> Result<Value, ToolError> {
    serde_json::to_value(result?).map_err(ToolError::Serialize)
}

/// Dispatches tool calls against the current catalog snapshot.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    catalog: CatalogRegistry,
    classifier: Arc<TaskClassifier>,
    schemas: Arc<BTreeMap<&'static str, ArgumentSchema>>,
}

impl ToolRegistry {
    pub fn new(catalog: CatalogRegistry, classifier: Arc<TaskClassifier>) -> Result<Self, ToolError> {
        let schemas = TOOLS
            .iter()
            .map(|tool| {
                (tool.schema)()
                    .map(|schema| (tool.name, schema))
                    .map_err(|message| ToolError::Schema {
                        tool: tool.name.to_string(),
                        message,
                    })
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(Self {
            catalog,
            classifier,
            schemas: Arc::new(schemas),
        })
    }

    pub fn catalog(&self) -> &CatalogRegistry {
        &self.catalog
    }

    pub fn classifier(&self) -> &TaskClassifier {
        &self.classifier
    }

    /// Every tool, in a stable order.
    pub fn list(&self) -> Vec<ToolDescriptor> {
        TOOLS
            .iter()
            .filter_map(|tool| {
                self.schemas.get(tool.name).map(|schema| ToolDescriptor {
                    name: tool.name,
                    description: tool.description,
                    input_schema: schema.schema().clone(),
                })
            })
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        TOOLS.iter().map(|t| t.name.to_string()).collect()
    }

    /// Validate `args` against the tool's schema and run it.
    pub async fn call(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let Some(schema) = self.schemas.get(name) else {
            return Err(ToolError::UnknownTool {
                name: name.to_string(),
                known: self.names(),
            });
        };
        tracing::debug!(tool = name, "Calling tool");

        let catalog = self.catalog.snapshot();
        let result = match name {
            "estimate_openai_cost" => {
                respond(ai::estimate_token_cost(&catalog, "openai", &schema.parse(args)?))
            }
            "estimate_anthropic_cost" => {
                respond(ai::estimate_token_cost(&catalog, "anthropic", &schema.parse(args)?))
            }
            "estimate_model_cost" => {
                let (provider, request) = schema.parse::<ai::ModelCostRequest>(args)?.into_parts();
                respond(ai::estimate_token_cost(&catalog, &provider, &request))
            }
            "compare_ai_models" => respond(ai::compare_models(&catalog, &schema.parse(args)?)),
            "recommend_ai_model" => {
                let request: ai::RecommendModelRequest = schema.parse(args)?;
                let classification = self.classifier.classify(&request.task_description).await;
                respond(ai::recommend_models(&catalog, classification, &request))
            }
            "classify_task" => {
                let request: ClassifyTaskRequest = schema.parse(args)?;
                let classification = self.classifier.classify(&request.text).await;
                serde_json::to_value(classification).map_err(ToolError::Serialize)
            }
            "estimate_compute_cost" => {
                respond(compute::estimate_compute_cost(&catalog, &schema.parse(args)?))
            }
            "calculate_reserved_savings" => {
                respond(compute::calculate_reserved_savings(&catalog, &schema.parse(args)?))
            }
            "compare_compute_providers" => {
                respond(compute::compare_compute_providers(&catalog, &schema.parse(args)?))
            }
            "estimate_storage_cost" => {
                respond(compute::estimate_storage_cost(&catalog, &schema.parse(args)?))
            }
            "estimate_bandwidth_cost" => {
                respond(bandwidth::estimate_bandwidth_cost(&catalog, &schema.parse(args)?))
            }
            "calculate_break_even" => respond(breakeven::calculate_break_even(&schema.parse(args)?)),
            "forecast_costs" => respond(forecast::forecast_costs(&schema.parse(args)?)),
            "calculate_runway" => respond(runway::calculate_runway(&schema.parse(args)?)),
            "recommend_saas_tier" => respond(saas::recommend_saas_tier(&catalog, &schema.parse(args)?)),
            "compare_saas_services" => {
                respond(saas::compare_saas_services(&catalog, &schema.parse(args)?))
            }
            "list_pricing_catalog" => respond(catalog::list_catalog(&catalog, &schema.parse(args)?)),
            _ => Err(ToolError::UnknownTool {
                name: name.to_string(),
                known: self.names(),
            }),
        };

        if let Err(e) = &result {
            tracing::debug!(tool = name, code = e.code(), error = %e, "Tool call failed");
        }
        result
    }
}
