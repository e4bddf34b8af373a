//! Answer synthesizer.
//!
//! Turns the executor's tabular output into a final natural-language answer.
//! An empty result set is a successful outcome with a fixed sentinel, not an
//! error, and costs no completion call.

use std::sync::Arc;

use crate::error::AssistError;
use crate::models::QueryRow;
use crate::traits::{ChatCompletion, ChatMessage, ChatParams};

/// Sentinel returned for an empty result set.
pub const NO_RESULT: &str = "No result found";

const SYNTH_TEMPERATURE: f32 = 0.3;

/// Fixed comprehension instructions: answer strictly from the supplied
/// rows, no meta-commentary about "the data", and product-shaped results
/// formatted one numbered line per record.
const SYNTH_SYSTEM_PROMPT: &str = "\
You are an expert in understanding the context of the question and replying based on the data pertaining
to the question provided. You will be provided with QUESTION: and DATA:. The data will be in the form of
an array of records. Reply based only on the data provided in DATA for answering the question asked as
QUESTION. Do not write anything like 'Based on the data' or any other technical words. Just a plain simple
natural language response. The data field always contains the answer of the question asked. Make sure to
note the column names to have some context, if needed, for your response.

When asked about products, always reply in the following format:
product title, price in Indian Rupees, discount, and rating, and then the product link.
Take care that all the products are in a list format, one line after the other. Not as a paragraph.

For example:
1. Campus Women Running Shoes: Rs. 1104 (35 percent off), Rating: 4.4 <link>";

/// Synthesize a natural-language answer from query rows.
///
/// Empty `rows` short-circuits to [`NO_RESULT`] without touching the
/// completion service; otherwise the rows are serialized as JSON and
/// answered in one completion call, returned verbatim.
pub async fn synthesize(
    chat: &Arc<dyn ChatCompletion>,
    question: &str,
    rows: &[QueryRow],
) -> Result<String, AssistError> {
    if rows.is_empty() {
        return Ok(NO_RESULT.to_string());
    }

    let data = serde_json::to_string(rows)
        .map_err(|e| AssistError::Infrastructure(format!("failed to serialize rows: {e}")))?;

    let messages = [
        ChatMessage::system(SYNTH_SYSTEM_PROMPT),
        ChatMessage::user(format!("QUESTION: {question} DATA: {data}")),
    ];
    let params = ChatParams {
        temperature: SYNTH_TEMPERATURE,
        max_tokens: None,
    };

    chat.complete(&messages, params)
        .await
        .map_err(|e| AssistError::Infrastructure(format!("completion service failed: {e}")))
}
