//! Static responses served when the AI provider cannot produce a usable answer.
//!
//! Every object here satisfies the required-key check of its `ResponseSchema`,
//! so the client always has something to render.

use serde_json::{Value, json};

use crate::models::{DocumentType, QuizDifficulty};

pub fn analysis(document_type: DocumentType) -> Value {
    json!({
        "summary": {
            "title": format!("Overview of your {}", document_type.label()),
            "overview": "We could not complete a detailed AI analysis of this document right now. The guidance below is general and applies to most legal documents. Read the full text carefully and consider asking a qualified lawyer before signing.",
            "keyPoints": [
                "Identify every party and confirm their names and roles are correct",
                "Note all dates, deadlines and renewal terms",
                "Check what you must pay, when, and what happens if you pay late",
                "Look for clauses that limit your rights or let the other party end the agreement"
            ]
        },
        "keyInformation": {
            "parties": [],
            "dates": [],
            "financialTerms": [],
            "obligations": [
                "Review your obligations section by section",
                "Confirm any notice requirements and how notices must be delivered"
            ]
        },
        "riskAssessment": {
            "overallRisk": "unknown",
            "score": null,
            "risks": [
                {
                    "level": "medium",
                    "title": "Automatic renewal or long commitment",
                    "description": "Many agreements renew automatically or lock you in for a fixed term. Check how and when you can cancel.",
                    "recommendation": "Find the termination clause and note the cancellation deadline."
                },
                {
                    "level": "medium",
                    "title": "Liability and indemnity",
                    "description": "Indemnity clauses can make you responsible for the other party's losses.",
                    "recommendation": "Ask for liability to be capped or made mutual."
                },
                {
                    "level": "low",
                    "title": "Dispute resolution",
                    "description": "Arbitration or foreign-jurisdiction clauses can make disputes expensive.",
                    "recommendation": "Check where and how disputes must be resolved."
                }
            ]
        },
        "actionPlan": {
            "immediate": [
                "Read the entire document, including any schedules or attachments",
                "Highlight clauses you do not understand"
            ],
            "beforeSigning": [
                "Ask the other party to explain or change unclear clauses in writing",
                "Keep a signed copy for your records"
            ],
            "consultLawyer": "Consider a lawyer if the document involves significant money, property, employment or long-term commitments."
        },
        "glossary": [
            {
                "term": "Indemnify",
                "definition": "To promise to cover another party's losses or legal costs."
            },
            {
                "term": "Termination",
                "definition": "Ending the agreement before or at the end of its term."
            },
            {
                "term": "Jurisdiction",
                "definition": "The courts or legal system that decide disputes under the agreement."
            }
        ],
        "disclaimer": "This is general information, not legal advice."
    })
}

pub fn term_explanation(term: &str) -> Value {
    json!({
        "term": term,
        "explanation": format!("A detailed explanation of \"{}\" is not available right now. Legal terms often carry a narrower meaning than in everyday use, so check whether the document defines it in a definitions section.", term),
        "example": "If a contract capitalises a word such as \"Services\", look for a clause that defines exactly what that word covers.",
        "relatedTerms": [],
        "disclaimer": "This is general information, not legal advice."
    })
}

pub fn scenarios(count: usize) -> Value {
    let catalogue = [
        json!({
            "title": "You want to end the agreement early",
            "situation": "Your circumstances change and you need to get out of the agreement before it expires.",
            "outcome": "Check the termination clause for notice periods and early-exit fees. Without one, you may be liable for the remaining term.",
            "likelihood": "medium",
            "recommendation": "Give written notice and keep proof of delivery."
        }),
        json!({
            "title": "A payment is late",
            "situation": "A payment due under the agreement is made after the deadline.",
            "outcome": "Late fees or interest may apply, and repeated late payment can count as a breach.",
            "likelihood": "medium",
            "recommendation": "Find the late-payment clause and any grace period."
        }),
        json!({
            "title": "The other party does not deliver",
            "situation": "The other side fails to provide what was promised.",
            "outcome": "You may be able to withhold payment, claim damages, or terminate, depending on the remedies clause.",
            "likelihood": "low",
            "recommendation": "Document the failure and notify them in writing."
        }),
        json!({
            "title": "A dispute arises",
            "situation": "You and the other party disagree about what the agreement requires.",
            "outcome": "The dispute resolution clause decides whether you go to mediation, arbitration or court.",
            "likelihood": "low",
            "recommendation": "Read the dispute resolution and governing law clauses."
        }),
        json!({
            "title": "The terms change",
            "situation": "The other party announces new terms during the agreement.",
            "outcome": "Unilateral changes are only binding if the agreement allows them, often with notice.",
            "likelihood": "medium",
            "recommendation": "Check the amendment clause and your right to reject changes."
        }),
    ];

    let selected: Vec<Value> = catalogue.into_iter().take(count.clamp(1, 5)).collect();
    json!({ "scenarios": selected })
}

pub fn quiz(question_count: usize, difficulty: QuizDifficulty) -> Value {
    let catalogue = [
        json!({
            "question": "What should you do before signing a legal document?",
            "options": ["Sign quickly to avoid delays", "Read the whole document carefully", "Only read the first page", "Rely on a verbal summary"],
            "correctAnswer": 1,
            "explanation": "Every clause can bind you, so read the entire document, including attachments."
        }),
        json!({
            "question": "What does a termination clause describe?",
            "options": ["How the agreement can be ended", "The price of the services", "Who drafted the document", "The governing language"],
            "correctAnswer": 0,
            "explanation": "Termination clauses set out when and how either party can end the agreement."
        }),
        json!({
            "question": "What does it mean to indemnify someone?",
            "options": ["To sue them", "To cover their losses or legal costs", "To hire them", "To cancel their contract"],
            "correctAnswer": 1,
            "explanation": "An indemnity shifts responsibility for certain losses to the indemnifying party."
        }),
        json!({
            "question": "Why do notice periods matter?",
            "options": ["They set the font size", "They are optional suggestions", "Missing them can cost you rights or money", "They only apply to landlords"],
            "correctAnswer": 2,
            "explanation": "Many rights, such as cancelling or disputing charges, depend on giving notice in time."
        }),
        json!({
            "question": "What does a governing law clause decide?",
            "options": ["Which country's or state's law applies", "Who pays taxes", "How long the contract is", "The payment method"],
            "correctAnswer": 0,
            "explanation": "It fixes which legal system interprets the agreement."
        }),
    ];

    let selected: Vec<Value> = catalogue.into_iter().cycle().take(question_count.clamp(1, 10)).collect();
    json!({
        "difficulty": difficulty.as_str(),
        "questions": selected
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResponseSchema;

    fn for_schema(schema: ResponseSchema) -> Value {
        match schema {
            ResponseSchema::Analysis => analysis(DocumentType::Other),
            ResponseSchema::TermExplanation => term_explanation("this term"),
            ResponseSchema::Scenarios => scenarios(3),
            ResponseSchema::Quiz => quiz(5, QuizDifficulty::Medium),
        }
    }

    #[test]
    fn test_every_fallback_satisfies_its_schema() {
        for schema in [
            ResponseSchema::Analysis,
            ResponseSchema::TermExplanation,
            ResponseSchema::Scenarios,
            ResponseSchema::Quiz,
        ] {
            let value = for_schema(schema);
            assert!(
                schema.is_satisfied_by(&value),
                "fallback for {} is missing {:?}",
                schema.name(),
                schema.missing_keys(&value)
            );
        }
    }

    #[test]
    fn test_analysis_mentions_document_type() {
        let value = analysis(DocumentType::Lease);
        assert_eq!(value["summary"]["title"], "Overview of your lease or rental agreement");
    }

    #[test]
    fn test_counts_are_respected_and_clamped() {
        assert_eq!(scenarios(2)["scenarios"].as_array().unwrap().len(), 2);
        assert_eq!(scenarios(0)["scenarios"].as_array().unwrap().len(), 1);
        assert_eq!(quiz(7, QuizDifficulty::Hard)["questions"].as_array().unwrap().len(), 7);
        assert_eq!(quiz(7, QuizDifficulty::Hard)["difficulty"], "hard");
    }

    #[test]
    fn test_term_is_echoed() {
        assert_eq!(term_explanation("force majeure")["term"], "force majeure");
    }
}
