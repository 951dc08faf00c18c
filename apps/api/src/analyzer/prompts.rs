// Image analyzer prompt templates.
// All prompts for the analyzer module are defined here.

pub const ANALYZE_SYSTEM: &str = "\
You are a precise lost-and-found item analyzer. \
Inspect a single photo of a personal item and extract identifying features. \
You MUST respond with valid JSON only — no markdown fences, no explanations. \
Report ONLY text you can actually read in the image — never invent names, \
ID numbers, or brands. Use an empty list when nothing is legible. \
Confidence reflects how certain you are about the item type, from 0.0 to 1.0.";

pub const ANALYZE_PROMPT: &str = r#"Analyze the item in this photo and return a JSON object with exactly this structure:

{
  "itemType": "string",        // short label, e.g. "ID Card", "Mobile Phone", "Backpack", "Wallet", "Keys", "Textbook"
  "detectedText": ["string"],  // every piece of legible text, verbatim
  "confidence": 0.0,           // certainty about itemType, 0.0 - 1.0
  "names": ["string"],         // person names visible in the image (owner labels, ID cards, engravings)
  "ids": ["string"],           // identification numbers: student IDs, serial numbers, license numbers
  "brands": ["string"]         // manufacturer or brand labels
}

Return the JSON object and nothing else."#;
