//! Mock lookup tools with fixed data.

use serde_json::json;

use super::FunctionTool;
use crate::types::tool::{ToolArgs, ToolDefinition, ToolOutcome};

fn string_arg<'a>(args: &'a ToolArgs, name: &str) -> &'a str {
    args.get(name).and_then(|v| v.as_str()).unwrap_or_default()
}

pub fn weather_report(city: &str) -> &'static str {
    match city.to_lowercase().as_str() {
        "new york" => "sunny with a temperature of 25°C.",
        "london" => "cloudy with a temperature of 15°C.",
        _ => "weather data not available for this city.",
    }
}

pub fn stock_price(symbol: &str) -> &'static str {
    match symbol.to_uppercase().as_str() {
        "GOOGL" => "175.50 USD",
        "MSFT" => "427.80 USD",
        _ => "stock price not available for this ticker.",
    }
}

/// `get_weather(city)` → `{"weather_report": ...}`.
pub fn weather_tool() -> FunctionTool {
    let definition = ToolDefinition::new("get_weather")
        .with_description("Retrieves the current weather report for a specified city.")
        .with_parameters(json!({
            "type": "object",
            "properties": { "city": { "type": "string", "minLength": 1 } },
            "required": ["city"]
        }));
    FunctionTool::from_fn(definition, |args| {
        let city = string_arg(args, "city");
        tracing::info!(tool = "get_weather", city, "tool executed");
        ToolOutcome::success(json!({ "weather_report": weather_report(city) }))
    })
}

/// `get_stock_price(symbol)` → `{"stock_price": ...}`.
pub fn stock_tool() -> FunctionTool {
    let definition = ToolDefinition::new("get_stock_price")
        .with_description("Retrieves the current stock price for a given ticker symbol.")
        .with_parameters(json!({
            "type": "object",
            "properties": { "symbol": { "type": "string", "minLength": 1 } },
            "required": ["symbol"]
        }));
    FunctionTool::from_fn(definition, |args| {
        let symbol = string_arg(args, "symbol");
        tracing::info!(tool = "get_stock_price", symbol, "tool executed");
        ToolOutcome::success(json!({ "stock_price": stock_price(symbol) }))
    })
}
