use crate::models::domain::QuestionType;

pub const GRADER_SYSTEM_PROMPT: &str = "You are a strict but fair exam grader for a school. \
You receive one exam question, an optional reference answer and a student's answer. \
Judge correctness and completeness against the reference answer when it is given, otherwise \
against your own knowledge of the subject. Award partial credit for partially correct work. \
Reply with a single JSON object matching the response schema and nothing else: `score` is a number \
between 0 and the maximum score inclusive, `feedback` is one or two short sentences addressed to \
the student.";

pub const NO_REFERENCE_ANSWER: &str =
    "No reference answer provided. Grade based on correctness and completeness.";

fn type_hint(question_type: QuestionType) -> &'static str {
    match question_type {
        QuestionType::Math => {
            "This is a math question. Accept equivalent forms of the final result and credit correct working."
        }
        QuestionType::Coding => {
            "This is a programming question. Judge whether the code solves the task; ignore cosmetic style."
        }
        _ => "This is an essay question. Judge content, not spelling or grammar.",
    }
}

pub fn build_grading_prompt(
    question_type: QuestionType,
    question: &str,
    key_answer: Option<&str>,
    student_answer: &str,
    max_score: f64,
) -> String {
    let reference = key_answer
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .unwrap_or(NO_REFERENCE_ANSWER);

    format!(
        "{hint}\n\nQuestion:\n{question}\n\nReference answer:\n{reference}\n\nStudent answer:\n{answer}\n\nScore range: 0 to {max}",
        hint = type_hint(question_type),
        question = question.trim(),
        reference = reference,
        answer = student_answer.trim(),
        max = max_score,
    )
}
