use crate::schema::Triple;

/// Asks for subject/predicate/object facts as entities plus relations in JSON
pub fn build_extraction_prompt(chunk_text: &str) -> String {
    format!(
        r#"Leia o texto abaixo e extraia os fatos que ele afirma como triplas (sujeito, predicado, objeto).

Cada entidade citada vira um item de "entities"; cada fato vira um item de "relations"
ligando a entidade sujeito (source) à entidade objeto (target).

Formato:
{{
  "entities": [
    {{"id": "E1", "name": "Python", "type": "TECHNOLOGY", "description": ""}},
    {{"id": "E2", "name": "linguagem", "type": "CONCEPT", "description": ""}}
  ],
  "relations": [
    {{"source": "E1", "target": "E2", "relation": "é_um", "evidence": "Python é uma linguagem"}}
  ]
}}

Regras:
- Nomes de entidades exatamente como aparecem no texto
- Predicados curtos, no idioma do texto, com _ no lugar de espaços
- Responda apenas com o objeto JSON, sem markdown

Texto:
{}

JSON:"#,
        chunk_text
    )
}

pub fn build_retry_prompt(invalid_json: &str) -> String {
    format!(
        "O JSON abaixo está inválido:\n\n{}\n\nCorrija-o e responda apenas com o objeto JSON corrigido, sem markdown nem explicações.",
        invalid_json
    )
}

/// Few-shot, step-by-step prompt that ends with an open `Q:` for the model to complete
pub fn build_qa_prompt(examples: &[(String, String)], triple: &Triple) -> String {
    let shots = examples
        .iter()
        .map(|(q, a)| format!("Q: {}\nA: {}", q, a))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{}\n\nConsidere a tripla: ({}, {}, {}). Pense passo a passo e gere uma pergunta relevante e sua resposta, seguindo o padrão dos exemplos.\nQ:",
        shots, triple.subject, triple.predicate, triple.object
    )
}
