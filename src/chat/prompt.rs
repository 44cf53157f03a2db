//! Guardrail prompt assembly.

/// Exact reply the assistant must give to off-topic requests.
pub const REFUSAL: &str = "Lo siento, como asistente de SparkCheck solo puedo ayudarte con análisis de consumo eléctrico y eficiencia.";

/// Context used when no attachment yielded any text.
pub const NO_CONTEXT_PLACEHOLDER: &str =
    "SISTEMA: El usuario no adjuntó documentos o no se pudo extraer texto de ellos.\n";

const CONTEXT_HEADER: &str = "DATOS TÉCNICOS EXTRAÍDOS DE LOS DOCUMENTOS:";

const QUESTION_PREFIX: &str = "PREGUNTA DEL USUARIO:";

/// Fixed system policy that opens every prompt.
pub fn system_policy() -> String {
    format!(
        "Eres SparkCheck IA, un asistente experto en ingeniería eléctrica y eficiencia energética. \
         Tu única función es analizar datos de consumo y dar recomendaciones de ahorro. \
         REGLAS CRÍTICAS:\n\
         1. USA LOS DATOS PROPORCIONADOS en el contexto para responder la duda del usuario.\n\
         2. Si el usuario pregunta por picos de voltaje o consumo, analiza las cifras y diles exactamente dónde están.\n\
         3. Si el usuario intenta hablar de temas no relacionados (cocina, ocio, programación), responde estrictamente: \
         '{}'\n\
         4. Mantén un tono técnico pero comprensible.",
        REFUSAL
    )
}

/// Wrap extracted document text, or fall back to the placeholder.
pub fn build_context(extracted: &str) -> String {
    if extracted.trim().is_empty() {
        NO_CONTEXT_PLACEHOLDER.to_string()
    } else {
        format!("{}\n{}\n", CONTEXT_HEADER, extracted)
    }
}

/// Policy, then context, then the literal question.
pub fn assemble(context: &str, question: &str) -> String {
    format!(
        "{}\n\n{}\n\n{} {}",
        system_policy(),
        context,
        QUESTION_PREFIX,
        question
    )
}
