use axum::response::Html;

use crate::{
    quiz::{DEFAULT_QUESTION_COUNT, MAX_QUESTION_COUNT},
    web::{
        CurrentUser,
        templates::{PageLayout, render_page},
    },
};

const QUIZ_SCRIPT: &str = include_str!("quiz_client.js");

const QUIZ_STYLES: &str = r#"
        .quiz-options { display: grid; gap: 0.75rem; margin: 1.25rem 0; }
        .quiz-option { background: #fafaf9; color: #1c1917; border: 1px solid #d6d3d1; text-align: left; }
        .quiz-option:hover { background: #ffedd5; }
        .quiz-option.selected { border-color: #c2410c; background: #ffedd5; }
        .quiz-option.correct { background: #dcfce7; border-color: #16a34a; }
        .quiz-option.wrong { background: #fee2e2; border-color: #b91c1c; }
        .quiz-meta { display: flex; justify-content: space-between; color: #57534e; font-weight: 600; }
        .quiz-timer { font-variant-numeric: tabular-nums; color: #c2410c; }
        .quiz-status { min-height: 1.5rem; color: #b91c1c; }
"#;

pub async fn quiz_page(CurrentUser(user): CurrentUser) -> Html<String> {
    Html(render_page(
        PageLayout::new("Quiz", user.as_ref(), render_quiz_body())
            .with_styles(QUIZ_STYLES)
            .with_script(QUIZ_SCRIPT),
    ))
}

fn render_quiz_body() -> String {
    format!(
        r#"<section class="panel" data-quiz>
    <p class="quiz-status" data-quiz-status></p>
    <div data-quiz-start>
        <h2>How well do you know Indonesian heritage?</h2>
        <p class="note">Each question has a timer. When it runs out, the question is locked as unanswered.</p>
        <form data-quiz-start-form>
            <label for="count">Number of questions</label>
            <input id="count" name="count" type="number" min="1" max="{max}" value="{default}">
            <label for="difficulty">Difficulty</label>
            <select id="difficulty" name="difficulty">
                <option value="easy">Easy</option>
                <option value="medium" selected>Medium</option>
                <option value="hard">Hard</option>
            </select>
            <p><button type="submit">Start quiz</button></p>
        </form>
    </div>
    <div data-quiz-question hidden>
        <div class="quiz-meta"><span data-quiz-progress></span><span class="quiz-timer" data-quiz-timer></span></div>
        <h2 data-quiz-prompt></h2>
        <div class="quiz-options" data-quiz-options></div>
        <p class="note" data-quiz-explanation></p>
        <button type="button" data-quiz-submit>Submit answer</button>
        <button type="button" data-quiz-next hidden>Next question</button>
    </div>
    <div data-quiz-result hidden>
        <h2>Your results</h2>
        <p data-quiz-summary></p>
        <button type="button" data-quiz-restart>Play again</button>
    </div>
</section>"#,
        max = MAX_QUESTION_COUNT,
        default = DEFAULT_QUESTION_COUNT,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_input_is_bounded() {
        let body = render_quiz_body();
        assert!(body.contains(&format!(r#"max="{MAX_QUESTION_COUNT}""#)));
        assert!(body.contains(&format!(r#"value="{DEFAULT_QUESTION_COUNT}""#)));
        assert!(QUIZ_SCRIPT.contains("/api/quiz/sessions"));
    }
}
