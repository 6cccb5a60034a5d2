use anyhow::{Context, Result};
use eval::{
    AbTestReport, AdaptiveRetriever, Alert, AlertSystem, ContinuousEvaluator, Dashboard, JsonlFineTuneQueue,
    LlmJudge, PromptOptimizer, PromptSample, PromptTemplates,
};
use extract::{
    CapitalizedSpanRecognizer, ChunkTagger, KeywordClassifier, KnowledgeGraph, LlmClient, LlmTripleExtractor,
    MetadataEnricher, OllamaClient, PatternExtractor, QaGenerator, QaPair, TripleExtractor, populate_graph,
};
use index::{
    CachedEmbedder, EmbeddedRecord, Embedder, EmbeddingClient, HashingEmbedder, IncrementalUpdater, Matrix,
    RecallCheck, Snapshot, UpdateReport, UpdateStatus, VectorIndexStore, embed_records,
};
use ingest::{Chunker, Ingestor, Segmenter, TextCleaner};
use query::{AnswerGenerator, CalibrationSample, CrossEncoder, HybridConfig, HybridRetriever, LlmCrossEncoder, Reranker};
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::{EmbeddingProvider, PipelineConfig, StoreBackend, TripleSource};
use crate::metrics::{StageMetrics, TimedOperation};
use crate::store::{
    EMBEDDINGS_TABLE, EVALUATIONS_TABLE, JsonlStore, METADATA_TABLE, QA_TABLE, RecordStore, SupabaseStore,
    TRIPLES_TABLE, init_schema,
};

/// External services the pipeline talks to, built once and shared
pub struct Collaborators {
    pub llm: Arc<dyn LlmClient>,
    pub embedder: Arc<dyn Embedder>,
    pub cross_encoder: Arc<dyn CrossEncoder>,
    pub triple_extractor: Arc<dyn TripleExtractor>,
    pub store: Arc<dyn RecordStore>,
}

impl Collaborators {
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let llm: Arc<dyn LlmClient> = Arc::new(OllamaClient::new(
            config.llm.base_url.clone(),
            config.llm.model.clone(),
        ));

        let base_embedder: Arc<dyn Embedder> = match config.embeddings.provider {
            EmbeddingProvider::Hashing => Arc::new(HashingEmbedder::new(config.embeddings.dimensions)),
            EmbeddingProvider::Ollama => Arc::new(EmbeddingClient::new(
                config.embeddings.base_url.clone(),
                config.embeddings.model.clone(),
            )),
        };
        let embedder: Arc<dyn Embedder> = if config.embeddings.cache.enabled {
            Arc::new(CachedEmbedder::new(
                base_embedder,
                Duration::from_secs(config.embeddings.cache.ttl_secs),
                config.embeddings.cache.max_entries,
            ))
        } else {
            base_embedder
        };

        let triple_extractor: Arc<dyn TripleExtractor> = match config.extraction.triples {
            TripleSource::Pattern => Arc::new(PatternExtractor::new()?),
            TripleSource::Llm => Arc::new(LlmTripleExtractor::new(llm.clone())),
        };

        let store: Arc<dyn RecordStore> = match config.store.backend {
            StoreBackend::Jsonl => Arc::new(JsonlStore::new(config.store_dir())),
            StoreBackend::Supabase => {
                let (Some(url), Some(key)) = (&config.store.supabase_url, &config.store.supabase_key) else {
                    anyhow::bail!("Supabase backend needs SUPABASE_URL and SUPABASE_KEY");
                };
                Arc::new(SupabaseStore::new(url.clone(), key.clone()))
            }
        };

        Ok(Self {
            cross_encoder: Arc::new(LlmCrossEncoder::new(llm.clone())),
            llm,
            embedder,
            triple_extractor,
            store,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    pub documents: usize,
    pub discarded_documents: usize,
    pub segments: usize,
    pub chunks: usize,
    pub chunks_for_review: usize,
    pub triples: usize,
    pub qa_pairs: usize,
    pub embedded: usize,
    pub mentions: usize,
    pub answers: usize,
    pub failed_answers: usize,
    pub evaluations: usize,
    pub hard_negatives: usize,
    pub update: Option<UpdateReport>,
    /// Set when the hybrid weights were calibrated on this run's questions
    pub hybrid_weights: Option<HybridConfig>,
    pub ab_test: Option<AbTestReport>,
    pub recall_at_k: Option<f32>,
    pub alerts: Vec<Alert>,
}

pub struct Pipeline {
    config: PipelineConfig,
    collaborators: Collaborators,
    metrics: Arc<StageMetrics>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, collaborators: Collaborators) -> Self {
        Self {
            config,
            collaborators,
            metrics: Arc::new(StageMetrics::new()),
        }
    }

    pub fn metrics(&self) -> Arc<StageMetrics> {
        self.metrics.clone()
    }

    fn finish_stage(&self, stage: &str, timer: TimedOperation, items: usize) {
        let elapsed = timer.elapsed();
        self.metrics.record_stage(stage, elapsed, items);
        info!(stage, count = items, elapsed_ms = elapsed.as_millis() as u64, "Stage finished");
    }

    async fn persist(&self, table: &str, record: serde_json::Value) {
        if let Err(e) = self.collaborators.store.insert(table, &record).await {
            warn!(table, "Failed to store record: {:#}", e);
            self.metrics.record_store_failure();
        }
    }

    /// Every row in service, searched for by its own reference, targets itself
    async fn recall_check(&self, base: &Snapshot) -> Option<RecallCheck> {
        let mut rows = Vec::new();
        let mut ground_truth = Vec::new();
        for (row, reference) in base.references.iter().enumerate() {
            match self.collaborators.embedder.encode(reference).await {
                Ok(vector) => {
                    rows.push(vector);
                    ground_truth.push(row);
                }
                Err(e) => warn!(reference = %reference, "Recall check embedding failed: {:#}", e),
            }
        }

        match Matrix::from_rows(&rows) {
            Ok(queries) if !queries.is_empty() => Some(RecallCheck { queries, ground_truth }),
            Ok(_) => None,
            Err(e) => {
                warn!("Recall check unusable: {:#}", e);
                None
            }
        }
    }

    /// Delta records whose embedding size matches the vectors in service
    fn usable_delta(&self, base: &Snapshot, records: &[EmbeddedRecord]) -> Vec<EmbeddedRecord> {
        let dimension = (!base.vectors.is_empty()).then(|| base.vectors.cols());
        let version = base.version.map_or(1, |v| v + 1);
        VectorIndexStore::new(self.config.indices_dir(), dimension)
            .build(records, version)
            .map(|delta| {
                delta
                    .references()
                    .iter()
                    .zip(delta.vectors().iter_rows())
                    .map(|(reference, row)| EmbeddedRecord {
                        reference: reference.clone(),
                        embedding: row.to_vec(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Share of the committed rows found in the top k when searching the
    /// saved index with their own reference
    async fn index_recall(&self, version: u32) -> Option<f32> {
        let index = match VectorIndexStore::new(self.config.indices_dir(), None).load(version).await {
            Ok(index) if !index.is_empty() => index,
            Ok(_) => return None,
            Err(e) => {
                warn!(version, "Failed to reload committed index: {:#}", e);
                return None;
            }
        };

        let k = self.config.incremental.recall_k;
        let mut found = 0;
        for (position, reference) in index.references().iter().enumerate() {
            match self.collaborators.embedder.encode(reference).await {
                Ok(query) => {
                    if index.search(&query, k).iter().any(|hit| hit.position == position) {
                        found += 1;
                    }
                }
                Err(e) => warn!(reference = %reference, "Query embedding failed: {:#}", e),
            }
        }
        Some(found as f32 / index.len() as f32)
    }

    /// A chunk is relevant to a question when it names both ends of its triple
    async fn calibration_samples(
        &self,
        retriever: &HybridRetriever,
        qa_pairs: &[QaPair],
        corpus: &[String],
    ) -> Vec<CalibrationSample> {
        let lowered: Vec<String> = corpus.iter().map(|t| t.to_lowercase()).collect();
        let mut samples = Vec::new();
        for qa in qa_pairs {
            let subject = qa.triple.subject.to_lowercase();
            let object = qa.triple.object.to_lowercase();
            let relevant: Vec<bool> = lowered
                .iter()
                .map(|t| t.contains(&subject) && t.contains(&object))
                .collect();

            let results = match retriever.retrieve(&qa.question, corpus, corpus.len()).await {
                Ok(results) => results,
                Err(e) => {
                    warn!(question = %qa.question, "Calibration retrieval failed: {:#}", e);
                    continue;
                }
            };
            let mut dense = vec![0.0; corpus.len()];
            let mut sparse = vec![0.0; corpus.len()];
            for result in results {
                dense[result.index] = result.dense_score;
                sparse[result.index] = result.sparse_score;
            }
            samples.push(CalibrationSample { dense, sparse, relevant });
        }
        samples
    }

    /// Runs every stage against the documents of `folder`
    pub async fn run(&self, folder: &Path) -> Result<PipelineReport> {
        if !folder.is_dir() {
            anyhow::bail!("Input folder does not exist: {}", folder.display());
        }
        tokio::fs::create_dir_all(&self.config.output_dir)
            .await
            .context(format!("Failed to create output directory {:?}", self.config.output_dir))?;
        init_schema(self.collaborators.store.as_ref()).await;

        let mut report = PipelineReport::default();
        let llm = self.collaborators.llm.clone();
        let embedder = self.collaborators.embedder.clone();

        // Step 1: Ingest
        let timer = TimedOperation::start();
        let mut ingest_config = self.config.ingest.clone();
        ingest_config.markdown_dir = Some(self.config.markdown_dir());
        let documents = Ingestor::new(ingest_config).ingest_directory(folder).await?;
        self.finish_stage("ingest", timer, documents.len());

        // Step 2: Clean
        let timer = TimedOperation::start();
        let cleaned = TextCleaner::new(self.config.cleaning.clone())?.clean_documents(documents);
        report.documents = cleaned.kept.len();
        report.discarded_documents = cleaned.discarded.len();
        self.finish_stage("clean", timer, cleaned.kept.len());

        // Step 3: Segment and chunk
        let timer = TimedOperation::start();
        let segmenter = Segmenter::new(self.config.segmentation.clone())?;
        let chunker = Chunker::new(self.config.chunking.clone());
        let mut chunks = Vec::new();
        for doc in &cleaned.kept {
            for segment in segmenter.segment(&doc.content) {
                report.segments += 1;
                chunks.extend(chunker.chunk_text(&doc.id, &segment.text, &doc.file_name));
            }
        }
        report.chunks = chunks.len();
        self.finish_stage("segment_chunk", timer, chunks.len());

        // Step 4: Classify
        let timer = TimedOperation::start();
        let tagger = ChunkTagger::new(
            Arc::new(KeywordClassifier::default()),
            self.config.classification.threshold,
        );
        let classified = tagger.run(chunks).await;
        report.chunks_for_review = classified.iter().filter(|c| c.needs_review()).count();
        self.finish_stage("classify", timer, classified.len());

        // Step 5: Knowledge graph
        let timer = TimedOperation::start();
        let mut graph = KnowledgeGraph::new(&self.config.extraction.namespace);
        populate_graph(
            self.collaborators.triple_extractor.as_ref(),
            classified.iter().map(|c| c.chunk.text.as_str()),
            &mut graph,
        )
        .await;
        graph.export_rdf(&self.config.graph_path()).await?;
        for triple in graph.triples() {
            self.persist(
                TRIPLES_TABLE,
                json!({ "sujeito": triple.subject, "predicado": triple.predicate, "objeto": triple.object }),
            )
            .await;
        }
        report.triples = graph.len();
        self.finish_stage("graph", timer, graph.len());

        // Step 6: QA generation
        let timer = TimedOperation::start();
        let qa_pairs = QaGenerator::new(llm.clone(), self.config.extraction.max_questions)
            .run(graph.triples())
            .await;
        for qa in &qa_pairs {
            self.persist(
                QA_TABLE,
                json!({ "pergunta": qa.question, "resposta": qa.answer, "tripla_relacionada": qa.triple }),
            )
            .await;
        }
        report.qa_pairs = qa_pairs.len();
        self.finish_stage("qa", timer, qa_pairs.len());

        // Step 7: Embed QA pairs and update the vector index
        let timer = TimedOperation::start();
        let items: Vec<(String, String)> = qa_pairs
            .iter()
            .map(|qa| (qa.question.clone(), format!("{}\n{}", qa.question, qa.answer)))
            .collect();
        let records = embed_records(embedder.as_ref(), &items).await;
        for record in &records {
            self.persist(
                EMBEDDINGS_TABLE,
                json!({ "embedding": record.embedding, "referencia": record.reference }),
            )
            .await;
        }
        report.embedded = records.len();

        if !records.is_empty() {
            let updater = IncrementalUpdater::new(
                self.config.embeddings_dir(),
                VectorIndexStore::new(self.config.indices_dir(), None),
                self.config.incremental.clone(),
            );
            let base = updater.current_snapshot().await?;
            let check = self.recall_check(&base).await;
            let delta = self.usable_delta(&base, &records);

            if delta.is_empty() {
                warn!("No embeddings usable for the index update");
            } else {
                match updater.update(&base, &delta, check.as_ref()).await {
                    Ok(update) => {
                        report.recall_at_k = match (update.status, update.version) {
                            (UpdateStatus::Committed, Some(version)) => self.index_recall(version).await,
                            _ => update.old_recall,
                        };
                        report.update = Some(update);
                    }
                    Err(e) => error!("Incremental update failed: {:#}", e),
                }
            }
        }
        self.finish_stage("embed_index", timer, records.len());

        // Step 8: Metadata enrichment
        let timer = TimedOperation::start();
        let enricher = MetadataEnricher::new(Arc::new(CapitalizedSpanRecognizer));
        let texts: Vec<(String, String)> = classified
            .iter()
            .map(|c| (c.chunk.doc_id.clone(), c.chunk.text.clone()))
            .collect();
        let enriched = enricher.enrich(&texts, &graph);
        for text in &enriched {
            for mention in &text.mentions {
                report.mentions += 1;
                self.persist(
                    METADATA_TABLE,
                    json!({ "entidade": mention.text, "tipo": mention.label, "documento_id": text.source_id }),
                )
                .await;
            }
        }
        self.finish_stage("metadata", timer, report.mentions);

        // Step 9: Retrieve, rerank and answer every generated question
        let timer = TimedOperation::start();
        let corpus: Vec<String> = classified.iter().map(|c| c.chunk.text.clone()).collect();
        let mut retriever = HybridRetriever::new(embedder.clone(), self.config.retrieval.weights);
        if self.config.retrieval.calibrate && !corpus.is_empty() {
            let samples = self.calibration_samples(&retriever, &qa_pairs, &corpus).await;
            report.hybrid_weights = Some(retriever.calibrate_weights(&samples));
        }
        let reranker = Reranker::new(self.collaborators.cross_encoder.clone(), self.config.rerank);

        let mut queries = Vec::new();
        let mut references = Vec::new();
        for qa in &qa_pairs {
            let candidates = match retriever.retrieve(&qa.question, &corpus, self.config.retrieval.top_k).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!(question = %qa.question, "Retrieval failed: {:#}", e);
                    continue;
                }
            };
            let ranked = reranker.rerank(&qa.question, candidates).await;
            let context: Vec<String> = ranked.into_iter().map(|r| r.candidate.text).collect();
            queries.push((qa.question.clone(), context));
            references.push(qa.reference.clone());
        }

        let generator = AnswerGenerator::new(llm.clone(), embedder.clone(), self.config.generation.clone());
        let answers = generator.answer_batch(&queries).await;
        for _ in answers.iter().filter(|a| a.failed) {
            self.metrics.record_llm_failure();
        }
        report.answers = answers.len();
        report.failed_answers = answers.iter().filter(|a| a.failed).count();
        self.finish_stage("answer", timer, answers.len());

        // Step 10: Evaluate
        let timer = TimedOperation::start();
        let evaluator = Arc::new(
            ContinuousEvaluator::new(LlmJudge::new(llm.clone())).with_bert_scorer(embedder.clone()),
        );
        let evaluations = evaluator.run(&answers, &references).await;
        for evaluation in &evaluations {
            self.persist(
                EVALUATIONS_TABLE,
                json!({
                    "pergunta": evaluation.query,
                    "resposta": evaluation.answer,
                    "score": evaluation.rouge_l(),
                    "feedback": evaluation.judge_feedback,
                    "avaliacao_automatica": evaluation.automatic,
                    "avaliacao_llm_judge": evaluation.judge_feedback,
                    "avaliacao_humana": evaluation.human_review,
                }),
            )
            .await;
        }
        report.evaluations = evaluations.len();
        self.finish_stage("evaluate", timer, evaluations.len());

        // Step 11: Mine hard negatives
        let timer = TimedOperation::start();
        let adaptive = AdaptiveRetriever::new(self.config.adaptation.clone())
            .with_trigger(Arc::new(JsonlFineTuneQueue::new(self.config.hard_negatives_path())));
        let adaptation = adaptive.run(&evaluations).await;
        report.hard_negatives = adaptation.hard_negatives.len();
        self.finish_stage("adapt", timer, report.hard_negatives);

        // Step 12: Prompt A/B test
        let timer = TimedOperation::start();
        if !answers.is_empty() {
            let samples: Vec<PromptSample> = answers
                .iter()
                .map(|a| PromptSample {
                    query: a.query.clone(),
                    context_documents: a.context_documents.clone(),
                })
                .collect();
            let optimizer = PromptOptimizer::new(llm.clone(), evaluator.clone());
            report.ab_test = Some(
                optimizer
                    .run_ab_test(&samples, &references, &PromptTemplates::default())
                    .await,
            );
        }
        self.finish_stage("prompt_ab", timer, answers.len());

        // Step 13: Dashboard and alerts
        let dashboard = Dashboard::new(self.config.dashboard_dir())
            .with_anomaly_threshold(self.config.alerts.anomaly_threshold);
        let dashboard_report = dashboard
            .run(&evaluations, report.recall_at_k, self.metrics.timings_ms())
            .await?;
        report.alerts = AlertSystem::new(self.config.alerts.recall_floor).run(&dashboard_report);

        info!(
            documents = report.documents,
            triples = report.triples,
            answers = report.answers,
            alerts = report.alerts.len(),
            "Pipeline finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Answers each prompt kind the pipeline sends. QA replies name the
    /// triple subject; with `echo_question` the answer repeats the question.
    struct StubLlm {
        echo_question: bool,
    }

    #[async_trait]
    impl LlmClient for StubLlm {
        async fn generate(&self, prompt: &str) -> Result<String> {
            let reply = if prompt.contains("Relevância:") {
                "0.8".to_string()
            } else if prompt.starts_with("Referência:") {
                "Resposta clara.".to_string()
            } else if prompt.ends_with("\nQ:") {
                let subject = prompt
                    .split("Considere a tripla: (")
                    .nth(1)
                    .and_then(|rest| rest.split(',').next())
                    .unwrap_or("Python");
                let question = format!("O que é {}?", subject);
                let answer = if self.echo_question {
                    question.clone()
                } else {
                    format!("{} é uma linguagem de programação.", subject)
                };
                format!(" {}\nA: {}", question, answer)
            } else {
                "Python é uma linguagem.".to_string()
            };
            Ok(reply)
        }
    }

    fn pipeline_with(config: PipelineConfig, echo_question: bool) -> Pipeline {
        let llm: Arc<dyn LlmClient> = Arc::new(StubLlm { echo_question });
        let collaborators = Collaborators {
            cross_encoder: Arc::new(LlmCrossEncoder::new(llm.clone())),
            llm,
            embedder: Arc::new(HashingEmbedder::new(256)),
            triple_extractor: Arc::new(PatternExtractor::new().unwrap()),
            store: Arc::new(JsonlStore::new(config.store_dir())),
        };
        Pipeline::new(config, collaborators)
    }

    fn config_for(output: &Path) -> PipelineConfig {
        PipelineConfig {
            output_dir: output.to_path_buf(),
            ..Default::default()
        }
    }

    fn pipeline(output: &Path) -> Pipeline {
        pipeline_with(config_for(output), false)
    }

    fn write_corpus(dir: &Path) {
        std::fs::write(
            dir.join("python.txt"),
            "Python é uma linguagem de programação muito usada em ciência de dados.\nRust is a language focused on memory safety and speed.",
        )
        .unwrap();
        std::fs::write(dir.join("notes.bin"), "ignored").unwrap();
    }

    #[tokio::test]
    async fn test_full_run_writes_outputs() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_corpus(input.path());

        let pipeline = pipeline(output.path());
        let report = pipeline.run(input.path()).await.unwrap();

        assert_eq!(report.documents, 1);
        assert_eq!(report.triples, 2);
        assert_eq!(report.qa_pairs, 2);
        assert_eq!(report.answers, 2);
        assert_eq!(report.evaluations, 2);
        assert_eq!(report.failed_answers, 0);
        assert!(report.hybrid_weights.is_none());

        let update = report.update.as_ref().unwrap();
        assert_eq!(update.status, UpdateStatus::Committed);
        assert_eq!(update.version, Some(1));
        assert_eq!(update.old_recall, None);
        assert_eq!(report.recall_at_k, Some(1.0));
        assert!(report.alerts.is_empty());

        let out = output.path();
        assert!(out.join("markdown").join("python.md").exists());
        assert!(out.join("grafo.rdf").exists());
        assert!(out.join("embeddings").join("embeddings_v1.npy").exists());
        assert!(out.join("indices").join("index_v1.npy").exists());
        assert!(out.join("dashboard").join("dashboard_report.json").exists());

        let qa_rows = std::fs::read_to_string(out.join("store").join("qa_gerado.jsonl")).unwrap();
        assert_eq!(qa_rows.lines().count(), 2);
        let rdf = std::fs::read_to_string(out.join("grafo.rdf")).unwrap();
        assert!(rdf.contains("http://example.org/Python"));

        let snapshot = pipeline.metrics().snapshot();
        assert!(snapshot.stages.contains_key("ingest"));
        assert_eq!(snapshot.store_failures, 0);
    }

    #[tokio::test]
    async fn test_second_run_appends_next_version() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_corpus(input.path());

        pipeline(output.path()).run(input.path()).await.unwrap();
        let report = pipeline(output.path()).run(input.path()).await.unwrap();

        let update = report.update.unwrap();
        assert_eq!(update.status, UpdateStatus::Committed);
        assert_eq!(update.version, Some(2));
        assert_eq!(update.rows, 4);
        assert_eq!(update.old_recall, Some(1.0));
        assert_eq!(update.new_recall, Some(1.0));
        assert!(output.path().join("embeddings").join("embeddings_v2.npy").exists());

        let history = std::fs::read_to_string(output.path().join("dashboard").join("metrics_history.jsonl")).unwrap();
        assert_eq!(history.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_crowding_delta_rolls_back() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_corpus(input.path());

        let mut config = config_for(output.path());
        config.incremental.recall_k = 1;
        pipeline_with(config.clone(), false).run(input.path()).await.unwrap();

        // Rows that embed exactly like the stored questions push the originals out of the top 1
        let report = pipeline_with(config, true).run(input.path()).await.unwrap();

        let update = report.update.unwrap();
        assert_eq!(update.status, UpdateStatus::RolledBack);
        assert_eq!(update.version, Some(1));
        assert_eq!(update.rows, 2);
        let (old, new) = (update.old_recall.unwrap(), update.new_recall.unwrap());
        assert!(old > new, "old {} new {}", old, new);
        assert_eq!(report.recall_at_k, Some(old));

        let out = output.path();
        assert!(out.join("embeddings").join("embeddings_v1.npy").exists());
        assert!(!out.join("embeddings").join("embeddings_v2.npy").exists());
        assert!(!out.join("indices").join("index_v2.npy").exists());
    }

    #[tokio::test]
    async fn test_calibration_sets_weights() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_corpus(input.path());

        let mut config = config_for(output.path());
        config.retrieval.calibrate = true;
        let report = pipeline_with(config, false).run(input.path()).await.unwrap();

        let weights = report.hybrid_weights.unwrap();
        assert!((weights.dense_weight + weights.sparse_weight - 1.0).abs() < 1e-5);
        assert_eq!(report.answers, 2);
    }

    #[tokio::test]
    async fn test_missing_folder_is_an_error() {
        let output = tempfile::tempdir().unwrap();
        let result = pipeline(output.path()).run(&output.path().join("missing")).await;
        assert!(result.is_err());
    }
}
