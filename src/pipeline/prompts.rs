//! Stage Prompts
//!
//! Prompt builders for every generative call in the pipeline. The outline
//! prompt's example block fixes the `- **Name:**` / `- **Description:**` line
//! shape that `extract::parse_section_titles` relies on.

use crate::config::ReportConfig;

// =============================================================================
// Planning
// =============================================================================

/// Stage 1: research questions for the whole topic
pub fn planning_queries(topic: &str) -> String {
    format!(
        r#"You're an AI research assistant.
Based on the topic: "{topic}", generate 5-7 focused research questions
that should be answered to plan a comprehensive report.
Return them as a simple numbered list."#
    )
}

/// Stage 2: structured outline from the planning search results
pub fn report_outline(topic: &str, search_summary: &str, config: &ReportConfig) -> String {
    let max_sections = config.max_sections.max(4);
    format!(
        r#"You are a strategic research planner.
Use the topic: "{topic}"
Use the following search results to generate a markdown list of 4-{max_sections} key report sections.
Each section should include:
- Name
- Description
- Research: true/false (whether it needs further web research)
- Content: (leave blank)

Use exactly this line format for every section, for example:
   - **Name:** NVIDIA's Key Competitive Advantages
   - **Description:** Detailed examination of NVIDIA's strategic moves that contribute to its market leadership, including its software ecosystem, acquisitions and partnerships.
   - **Research:** True
   - **Content:** [blank]

Search Results:
---
{search_summary}
---"#
    )
}

// =============================================================================
// Section Research and Writing
// =============================================================================

/// Stage 3: exploratory questions for one section
pub fn section_queries(topic: &str, section: &str) -> String {
    format!(
        r#"You're a research assistant tasked with helping generate research questions.
The report topic is: "{topic}"
Generate 5-7 useful and diverse research questions to explore the section topic: "{section}"
Return them as a simple numbered list."#
    )
}

/// Stage 5: draft one section from its research documents
pub fn section_draft(
    section: &str,
    description: &str,
    documents: &str,
    config: &ReportConfig,
) -> String {
    format!(
        r#"You are an expert report writer. Your task is to write a detailed section for a research report.
Section Title: {section}
Section Description: {description}
Search Documents:
{documents}

Instructions:
- Use a professional and analytical tone.
- The section should be ~{min}-{max} words.
- Organize it into 2-3 paragraphs.
- Use the documents as supporting material.
- Where appropriate, cite the URLs in parentheses.

Now write the content of this section:"#,
        min = config.min_section_words,
        max = config.max_section_words,
    )
}

// =============================================================================
// Final Sections
// =============================================================================

/// Stage 7: introduction conditioned on the formatted body
pub fn introduction(topic: &str, body: &str) -> String {
    format!(
        r#"You are an expert research summarizer. Use a professional, analytical, and engaging tone.
Write the introduction for a research report titled: "{topic}"

Content Summary:
{body}

Guidelines:
- Length: ~150-200 words
- Introduction should preview what will be covered and why it's relevant.
- Do not repeat full section titles or cite specific URLs."#
    )
}

/// Stage 7: conclusion conditioned on the formatted body
pub fn conclusion(topic: &str, body: &str) -> String {
    format!(
        r#"You are an expert research summarizer. Use a professional, analytical, and engaging tone.
Write the conclusion for a research report titled: "{topic}"

Content Summary:
{body}

Guidelines:
- Length: ~150-200 words
- Conclusion should summarize the key takeaways and offer closing insights.
- Do not repeat full section titles or cite specific URLs."#
    )
}
